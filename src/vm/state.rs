//! World state, log records, and frame memory.
//!
//! The interpreter needs:
//!   - Accounts: address → {balance, nonce, code, storage}
//!   - Contract storage (sload/sstore): word key → word value per account
//!   - Memory: linear byte array, grows in 32-byte words, zero-extended
//!   - Logs: LOG0..LOG4 records collected per frame

use crate::vm::errors::VmError;
use primitive_types::{H160, U256};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A log record emitted by a contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    pub address: H160,
    pub topics:  Vec<U256>,
    pub data:    Vec<u8>,
}

/// One account in world state. Absent storage keys read as 0.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    #[serde(default)]
    pub balance: U256,
    #[serde(default)]
    pub nonce:   u64,
    #[serde(default)]
    pub code:    Vec<u8>,
    #[serde(default)]
    pub storage: BTreeMap<U256, U256>,
}

/// World state: address → account. Shared down the frame chain by `&mut`;
/// callers snapshot-clone around sub-calls and restore on failure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldState {
    pub accounts: BTreeMap<H160, Account>,
}

impl WorldState {
    pub fn account(&self, addr: &H160) -> Option<&Account> {
        self.accounts.get(addr)
    }

    pub fn balance(&self, addr: &H160) -> U256 {
        self.accounts.get(addr).map(|a| a.balance).unwrap_or_default()
    }

    pub fn nonce(&self, addr: &H160) -> u64 {
        self.accounts.get(addr).map(|a| a.nonce).unwrap_or_default()
    }

    /// Code at `addr`; absent accounts have empty code.
    pub fn code(&self, addr: &H160) -> Vec<u8> {
        self.accounts.get(addr).map(|a| a.code.clone()).unwrap_or_default()
    }

    pub fn set_code(&mut self, addr: &H160, code: Vec<u8>) {
        self.accounts.entry(*addr).or_default().code = code;
    }

    pub fn sload(&self, addr: &H160, key: &U256) -> U256 {
        self.accounts
            .get(addr)
            .and_then(|a| a.storage.get(key))
            .copied()
            .unwrap_or_default()
    }

    /// Storing zero deletes the slot.
    pub fn sstore(&mut self, addr: &H160, key: U256, value: U256) {
        let account = self.accounts.entry(*addr).or_default();
        if value.is_zero() {
            account.storage.remove(&key);
        } else {
            account.storage.insert(key, value);
        }
    }

    pub fn credit(&mut self, addr: &H160, amount: U256) {
        let account = self.accounts.entry(*addr).or_default();
        account.balance = account.balance.overflowing_add(amount).0;
    }

    /// Move `value` from `from` to `to`. Returns false (and leaves state
    /// untouched) when the source balance is insufficient.
    pub fn transfer(&mut self, from: &H160, to: &H160, value: U256) -> bool {
        if value.is_zero() {
            return true;
        }
        let src = self.balance(from);
        if src < value {
            return false;
        }
        self.accounts.entry(*from).or_default().balance = src - value;
        self.credit(to, value);
        true
    }

    pub fn bump_nonce(&mut self, addr: &H160) {
        let account = self.accounts.entry(*addr).or_default();
        account.nonce = account.nonce.saturating_add(1);
    }
}

/// Linear memory used during a single frame.
/// Grows in 32-byte word chunks, so `size()` is always 32-aligned and
/// monotone. Max 4 MiB; with gas unmetered this cap is the only brake on
/// runaway expansion.
pub struct Memory {
    data: Vec<u8>,
}

const MAX_MEMORY_BYTES: usize = 4 * 1024 * 1024;

impl Memory {
    pub fn new() -> Self {
        Self { data: Vec::new() }
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Grow to cover `[offset, offset + size)`, rounded up to a word
    /// boundary. Zero-size accesses do not grow.
    pub fn ensure(&mut self, offset: usize, size: usize) -> Result<(), VmError> {
        if size == 0 {
            return Ok(());
        }
        let new_end = offset.checked_add(size).ok_or(VmError::MemoryLimit)?;
        if new_end > MAX_MEMORY_BYTES {
            return Err(VmError::MemoryLimit);
        }
        if new_end > self.data.len() {
            let new_words = (new_end + 31) / 32;
            self.data.resize(new_words * 32, 0);
        }
        Ok(())
    }

    /// Read a big-endian word at `offset`.
    pub fn load32(&mut self, offset: usize) -> Result<U256, VmError> {
        self.ensure(offset, 32)?;
        Ok(U256::from_big_endian(&self.data[offset..offset + 32]))
    }

    /// Write `value` as 32 big-endian bytes at `offset`.
    pub fn store32(&mut self, offset: usize, value: U256) -> Result<(), VmError> {
        self.ensure(offset, 32)?;
        value.to_big_endian(&mut self.data[offset..offset + 32]);
        Ok(())
    }

    /// Write a single byte at `offset`.
    pub fn store8(&mut self, offset: usize, byte: u8) -> Result<(), VmError> {
        self.ensure(offset, 1)?;
        self.data[offset] = byte;
        Ok(())
    }

    /// Read `size` bytes at `offset`, growing first.
    pub fn read_range(&mut self, offset: usize, size: usize) -> Result<Vec<u8>, VmError> {
        if size == 0 {
            return Ok(vec![]);
        }
        self.ensure(offset, size)?;
        Ok(self.data[offset..offset + size].to_vec())
    }

    /// Write a slice at `offset`.
    pub fn write_range(&mut self, offset: usize, data: &[u8]) -> Result<(), VmError> {
        if data.is_empty() {
            return Ok(());
        }
        self.ensure(offset, data.len())?;
        self.data[offset..offset + data.len()].copy_from_slice(data);
        Ok(())
    }

    /// Write `src` into `[offset, offset + size)`, zero-filling the tail
    /// when `src` is shorter than `size`. Used by the *COPY opcodes, which
    /// read past the end of their source as zeros.
    pub fn write_padded(&mut self, offset: usize, src: &[u8], size: usize) -> Result<(), VmError> {
        if size == 0 {
            return Ok(());
        }
        self.ensure(offset, size)?;
        let n = src.len().min(size);
        self.data[offset..offset + n].copy_from_slice(&src[..n]);
        for b in &mut self.data[offset + n..offset + size] {
            *b = 0;
        }
        Ok(())
    }
}
