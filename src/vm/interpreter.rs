//! EVM bytecode interpreter — dispatch loop and call/create engine.
//!
//! One frame per activation: own pc, stack, memory, log buffer, and
//! sub-return buffer. Sub-calls (CALL/CALLCODE/DELEGATECALL/STATICCALL) and
//! creates (CREATE/CREATE2) recurse into `run_frame` with a derived
//! transaction context; world state is snapshot-cloned before every
//! sub-frame and restored when it fails, so a failed callee leaves no
//! storage, balance, or nonce residue in the caller's view.
//!
//! Gas is an unbounded resource here: the GAS opcode reports 2^256 - 1 and
//! the `gas` operand of the CALL family is popped and discarded.

use crate::vm::bytecode as op;
use crate::vm::context::{BlockContext, TxContext};
use crate::vm::errors::VmError;
use crate::vm::state::{LogRecord, Memory, WorldState};
use crate::vm::word;
use primitive_types::{H160, U256};
use rlp::RlpStream;
use sha3::{Digest, Keccak256};
use std::collections::HashSet;
use tracing::{debug, trace};

const STACK_LIMIT: usize = 1024;
const MAX_CALL_DEPTH: usize = 1024;

/// Max deployed bytecode size (EIP-170).
pub const MAX_CODE_SIZE: usize = 24_576;

/// Result of a top-level execution.
///
/// `stack` is top-first. On failure the stack is empty by contract and
/// `return_data` carries the REVERT payload (empty for other faults).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecResult {
    pub success:     bool,
    pub stack:       Vec<U256>,
    pub return_data: Vec<u8>,
    pub logs:        Vec<LogRecord>,
}

/// Raw outcome of one frame. REVERT is an `Ok` with `reverted` set; machine
/// faults surface as `Err(VmError)` from `run_frame`.
struct FrameOutput {
    stack:       Vec<U256>,
    return_data: Vec<u8>,
    reverted:    bool,
    logs:        Vec<LogRecord>,
}

/// Execute `code` against `state` and fold faults into an `ExecResult`.
pub fn execute(
    code:     &[u8],
    tx:       &TxContext,
    block:    &BlockContext,
    state:    &mut WorldState,
    writable: bool,
) -> ExecResult {
    match run_frame(code, tx, block, state, writable, 0) {
        Ok(out) if !out.reverted => {
            let mut stack = out.stack;
            stack.reverse();
            ExecResult {
                success: true,
                stack,
                return_data: out.return_data,
                logs: out.logs,
            }
        }
        Ok(out) => ExecResult {
            success: false,
            stack: vec![],
            return_data: out.return_data,
            logs: vec![],
        },
        Err(e) => {
            debug!(error = %e, "frame aborted");
            ExecResult { success: false, stack: vec![], return_data: vec![], logs: vec![] }
        }
    }
}

// ── Stack helpers ─────────────────────────────────────────────────────────

fn pop(stack: &mut Vec<U256>) -> Result<U256, VmError> {
    stack.pop().ok_or(VmError::StackUnderflow)
}

fn push(stack: &mut Vec<U256>, v: U256) -> Result<(), VmError> {
    if stack.len() >= STACK_LIMIT {
        return Err(VmError::StackOverflow);
    }
    stack.push(v);
    Ok(())
}

fn bool_word(v: bool) -> U256 {
    if v {
        U256::one()
    } else {
        U256::zero()
    }
}

// ── Word / byte conversions ───────────────────────────────────────────────

/// Memory offsets and sizes must fit 64 bits; anything larger would blow
/// the memory cap anyway.
fn to_usize(x: &U256) -> Result<usize, VmError> {
    if x.bits() > 64 {
        return Err(VmError::MemoryLimit);
    }
    Ok(x.low_u64() as usize)
}

fn word_to_address(x: &U256) -> H160 {
    let mut buf = [0u8; 32];
    x.to_big_endian(&mut buf);
    H160::from_slice(&buf[12..])
}

fn address_to_word(a: &H160) -> U256 {
    U256::from_big_endian(a.as_bytes())
}

fn keccak_word(data: &[u8]) -> U256 {
    U256::from_big_endian(&Keccak256::digest(data))
}

// ── JUMPDEST analysis ─────────────────────────────────────────────────────

/// Linear pre-scan: JUMPDEST bytes inside PUSH immediates are data, not
/// destinations.
fn build_jumpdest_set(code: &[u8]) -> HashSet<usize> {
    let mut valid = HashSet::new();
    let mut i = 0;
    while i < code.len() {
        let opcode = code[i];
        if opcode == op::JUMPDEST {
            valid.insert(i);
        }
        i += 1 + op::push_data_size(opcode);
    }
    valid
}

// ── Copy helpers ──────────────────────────────────────────────────────────

/// CALLDATACOPY/CODECOPY/EXTCODECOPY/RETURNDATACOPY: write `size` bytes of
/// `source` starting at `src_off` to memory, reading past the end of the
/// source as zeros.
fn copy_to_memory(
    mem:     &mut Memory,
    dest:    &U256,
    src_off: &U256,
    size:    &U256,
    source:  &[u8],
) -> Result<(), VmError> {
    if size.is_zero() {
        return Ok(());
    }
    let dest = to_usize(dest)?;
    let size = to_usize(size)?;
    let start = if src_off.bits() > 64 {
        source.len()
    } else {
        (src_off.low_u64() as usize).min(source.len())
    };
    let end = start.saturating_add(size).min(source.len());
    mem.write_padded(dest, &source[start..end], size)
}

/// A 32-byte big-endian load from `data` at `offset`, zero-filled past the
/// end.
fn load_word_padded(data: &[u8], offset: &U256) -> U256 {
    let mut buf = [0u8; 32];
    if offset.bits() <= 64 {
        let off = offset.low_u64() as usize;
        for (i, slot) in buf.iter_mut().enumerate() {
            if let Some(b) = off.checked_add(i).and_then(|p| data.get(p)) {
                *slot = *b;
            }
        }
    }
    U256::from_big_endian(&buf)
}

// ── Address derivation ────────────────────────────────────────────────────

/// CREATE: `keccak(rlp([sender, nonce]))[12..]`.
pub fn create_address(sender: &H160, nonce: u64) -> H160 {
    let mut s = RlpStream::new_list(2);
    s.append(&sender.as_bytes().to_vec());
    s.append(&nonce);
    let hash = Keccak256::digest(s.out());
    H160::from_slice(&hash[12..])
}

/// CREATE2: `keccak(0xff ‖ sender ‖ salt ‖ keccak(initcode))[12..]`.
pub fn create2_address(sender: &H160, salt: &U256, initcode: &[u8]) -> H160 {
    let mut salt_bytes = [0u8; 32];
    salt.to_big_endian(&mut salt_bytes);
    let mut hasher = Keccak256::new();
    hasher.update([0xFF]);
    hasher.update(sender.as_bytes());
    hasher.update(salt_bytes);
    hasher.update(Keccak256::digest(initcode));
    let hash = hasher.finalize();
    H160::from_slice(&hash[12..])
}

// ── Sub-frame drivers ─────────────────────────────────────────────────────

/// Run a CALL-family sub-frame. Snapshots state first; a failed callee
/// (fault or revert) restores the snapshot and surfaces no logs. The
/// optional transfer moves the CALL value before the callee runs;
/// insufficient balance fails the call without executing it.
fn run_subcall(
    code:     &[u8],
    sub_tx:   &TxContext,
    block:    &BlockContext,
    state:    &mut WorldState,
    writable: bool,
    depth:    usize,
    transfer: Option<(H160, H160, U256)>,
) -> (bool, Vec<u8>, Vec<LogRecord>) {
    let snapshot = state.clone();
    if let Some((from, to, value)) = transfer {
        if !state.transfer(&from, &to, value) {
            return (false, vec![], vec![]);
        }
    }
    match run_frame(code, sub_tx, block, state, writable, depth) {
        Ok(out) if !out.reverted => (true, out.return_data, out.logs),
        Ok(out) => {
            *state = snapshot;
            (false, out.return_data, vec![])
        }
        Err(e) => {
            debug!(error = %e, depth, "sub-call aborted");
            *state = snapshot;
            (false, vec![], vec![])
        }
    }
}

/// Run initcode for CREATE/CREATE2 at the derived address. On success the
/// frame's return payload becomes the deployed code and the pushed word is
/// the new address; any failure rolls the snapshot back and pushes 0.
/// The sub-return buffer carries the revert payload only — a successful
/// create leaves it empty.
fn run_create(
    created:  H160,
    initcode: &[u8],
    value:    U256,
    tx:       &TxContext,
    block:    &BlockContext,
    state:    &mut WorldState,
    depth:    usize,
) -> (bool, Vec<u8>, Vec<LogRecord>) {
    let snapshot = state.clone();
    state.bump_nonce(&tx.address);

    // Address collision: an account with code or a used nonce blocks the
    // create.
    let occupied = state
        .account(&created)
        .map(|a| !a.code.is_empty() || a.nonce > 0)
        .unwrap_or(false);
    if occupied || !state.transfer(&tx.address, &created, value) {
        *state = snapshot;
        return (false, vec![], vec![]);
    }
    state.accounts.entry(created).or_default().nonce = 1;

    let sub_tx = TxContext {
        address:   created,
        caller:    tx.address,
        origin:    tx.origin,
        gas_price: tx.gas_price,
        value,
        data:      vec![],
    };
    match run_frame(initcode, &sub_tx, block, state, true, depth) {
        Ok(out) if !out.reverted => {
            if out.return_data.len() > MAX_CODE_SIZE {
                debug!(size = out.return_data.len(), "{}", VmError::CodeTooLarge);
                *state = snapshot;
                return (false, vec![], vec![]);
            }
            state.set_code(&created, out.return_data);
            (true, vec![], out.logs)
        }
        Ok(out) => {
            *state = snapshot;
            (false, out.return_data, vec![])
        }
        Err(e) => {
            debug!(error = %e, depth, "create aborted");
            *state = snapshot;
            (false, vec![], vec![])
        }
    }
}

// ── Main execution ────────────────────────────────────────────────────────

fn run_frame(
    code:     &[u8],
    tx:       &TxContext,
    block:    &BlockContext,
    state:    &mut WorldState,
    writable: bool,
    depth:    usize,
) -> Result<FrameOutput, VmError> {
    if depth > MAX_CALL_DEPTH {
        return Err(VmError::CallDepth);
    }
    let jumpdests = build_jumpdest_set(code);
    let mut pc = 0usize;
    let mut stack: Vec<U256> = Vec::with_capacity(64);
    let mut mem = Memory::new();
    let mut logs: Vec<LogRecord> = Vec::new();
    let mut sub_return: Vec<u8> = Vec::new();

    while pc < code.len() {
        let opcode = code[pc];
        trace!(depth, pc, op = op::name(opcode), "step");
        pc += 1;

        match opcode {
            op::STOP => {
                return Ok(FrameOutput { stack, return_data: vec![], reverted: false, logs });
            }

            // ── Arithmetic ───────────────────────────────────────────────
            // First popped = left operand throughout.
            op::ADD => {
                let a = pop(&mut stack)?;
                let b = pop(&mut stack)?;
                push(&mut stack, a.overflowing_add(b).0)?;
            }
            op::MUL => {
                let a = pop(&mut stack)?;
                let b = pop(&mut stack)?;
                push(&mut stack, a.overflowing_mul(b).0)?;
            }
            op::SUB => {
                let a = pop(&mut stack)?;
                let b = pop(&mut stack)?;
                push(&mut stack, a.overflowing_sub(b).0)?;
            }
            op::DIV => {
                let a = pop(&mut stack)?;
                let b = pop(&mut stack)?;
                push(&mut stack, a.checked_div(b).unwrap_or_default())?;
            }
            op::SDIV => {
                let a = pop(&mut stack)?;
                let b = pop(&mut stack)?;
                push(&mut stack, word::sdiv(a, b))?;
            }
            op::MOD => {
                let a = pop(&mut stack)?;
                let b = pop(&mut stack)?;
                push(&mut stack, a.checked_rem(b).unwrap_or_default())?;
            }
            op::SMOD => {
                let a = pop(&mut stack)?;
                let b = pop(&mut stack)?;
                push(&mut stack, word::smod(a, b))?;
            }
            op::ADDMOD => {
                let a = pop(&mut stack)?;
                let b = pop(&mut stack)?;
                let n = pop(&mut stack)?;
                push(&mut stack, word::addmod(a, b, n))?;
            }
            op::MULMOD => {
                let a = pop(&mut stack)?;
                let b = pop(&mut stack)?;
                let n = pop(&mut stack)?;
                push(&mut stack, word::mulmod(a, b, n))?;
            }
            op::EXP => {
                let a = pop(&mut stack)?;
                let e = pop(&mut stack)?;
                push(&mut stack, a.overflowing_pow(e).0)?;
            }
            op::SIGNEXTEND => {
                let k = pop(&mut stack)?;
                let x = pop(&mut stack)?;
                push(&mut stack, word::sign_extend(k, x))?;
            }

            // ── Comparison / bitwise ─────────────────────────────────────
            op::LT => {
                let a = pop(&mut stack)?;
                let b = pop(&mut stack)?;
                push(&mut stack, bool_word(a < b))?;
            }
            op::GT => {
                let a = pop(&mut stack)?;
                let b = pop(&mut stack)?;
                push(&mut stack, bool_word(a > b))?;
            }
            op::SLT => {
                let a = pop(&mut stack)?;
                let b = pop(&mut stack)?;
                push(&mut stack, bool_word(word::slt(a, b)))?;
            }
            op::SGT => {
                let a = pop(&mut stack)?;
                let b = pop(&mut stack)?;
                push(&mut stack, bool_word(word::sgt(a, b)))?;
            }
            op::EQ => {
                let a = pop(&mut stack)?;
                let b = pop(&mut stack)?;
                push(&mut stack, bool_word(a == b))?;
            }
            op::ISZERO => {
                let a = pop(&mut stack)?;
                push(&mut stack, bool_word(a.is_zero()))?;
            }
            op::AND => {
                let a = pop(&mut stack)?;
                let b = pop(&mut stack)?;
                push(&mut stack, a & b)?;
            }
            op::OR => {
                let a = pop(&mut stack)?;
                let b = pop(&mut stack)?;
                push(&mut stack, a | b)?;
            }
            op::XOR => {
                let a = pop(&mut stack)?;
                let b = pop(&mut stack)?;
                push(&mut stack, a ^ b)?;
            }
            op::NOT => {
                let a = pop(&mut stack)?;
                push(&mut stack, !a)?;
            }
            op::BYTE => {
                let i = pop(&mut stack)?;
                let x = pop(&mut stack)?;
                push(&mut stack, word::byte(i, x))?;
            }
            op::SHL => {
                let shift = pop(&mut stack)?;
                let value = pop(&mut stack)?;
                push(&mut stack, word::shl(shift, value))?;
            }
            op::SHR => {
                let shift = pop(&mut stack)?;
                let value = pop(&mut stack)?;
                push(&mut stack, word::shr(shift, value))?;
            }
            op::SAR => {
                let shift = pop(&mut stack)?;
                let value = pop(&mut stack)?;
                push(&mut stack, word::sar(shift, value))?;
            }

            // ── Hashing ──────────────────────────────────────────────────
            op::SHA3 => {
                let offset = pop(&mut stack)?;
                let size = pop(&mut stack)?;
                let data = mem.read_range(to_usize(&offset)?, to_usize(&size)?)?;
                push(&mut stack, keccak_word(&data))?;
            }

            // ── Environment ──────────────────────────────────────────────
            op::ADDRESS => push(&mut stack, address_to_word(&tx.address))?,
            op::BALANCE => {
                let addr = word_to_address(&pop(&mut stack)?);
                push(&mut stack, state.balance(&addr))?;
            }
            op::ORIGIN => push(&mut stack, address_to_word(&tx.origin))?,
            op::CALLER => push(&mut stack, address_to_word(&tx.caller))?,
            op::CALLVALUE => push(&mut stack, tx.value)?,
            op::CALLDATALOAD => {
                let offset = pop(&mut stack)?;
                push(&mut stack, load_word_padded(&tx.data, &offset))?;
            }
            op::CALLDATASIZE => push(&mut stack, U256::from(tx.data.len()))?,
            op::CALLDATACOPY => {
                let dest = pop(&mut stack)?;
                let offset = pop(&mut stack)?;
                let size = pop(&mut stack)?;
                copy_to_memory(&mut mem, &dest, &offset, &size, &tx.data)?;
            }
            op::CODESIZE => push(&mut stack, U256::from(code.len()))?,
            op::CODECOPY => {
                let dest = pop(&mut stack)?;
                let offset = pop(&mut stack)?;
                let size = pop(&mut stack)?;
                copy_to_memory(&mut mem, &dest, &offset, &size, code)?;
            }
            op::GASPRICE => push(&mut stack, tx.gas_price)?,
            op::EXTCODESIZE => {
                let addr = word_to_address(&pop(&mut stack)?);
                push(&mut stack, U256::from(state.code(&addr).len()))?;
            }
            op::EXTCODECOPY => {
                let addr = word_to_address(&pop(&mut stack)?);
                let dest = pop(&mut stack)?;
                let offset = pop(&mut stack)?;
                let size = pop(&mut stack)?;
                let source = state.code(&addr);
                copy_to_memory(&mut mem, &dest, &offset, &size, &source)?;
            }
            op::RETURNDATASIZE => push(&mut stack, U256::from(sub_return.len()))?,
            op::RETURNDATACOPY => {
                let dest = pop(&mut stack)?;
                let offset = pop(&mut stack)?;
                let size = pop(&mut stack)?;
                copy_to_memory(&mut mem, &dest, &offset, &size, &sub_return)?;
            }
            op::EXTCODEHASH => {
                let addr = word_to_address(&pop(&mut stack)?);
                let hash = match state.account(&addr) {
                    None => U256::zero(),
                    Some(a) => keccak_word(&a.code),
                };
                push(&mut stack, hash)?;
            }

            // ── Block ────────────────────────────────────────────────────
            op::COINBASE => push(&mut stack, address_to_word(&block.coinbase))?,
            op::TIMESTAMP => push(&mut stack, block.timestamp)?,
            op::NUMBER => push(&mut stack, block.number)?,
            op::DIFFICULTY => push(&mut stack, block.difficulty)?,
            op::GASLIMIT => push(&mut stack, block.gas_limit)?,
            op::CHAINID => push(&mut stack, block.chain_id)?,
            op::SELFBALANCE => push(&mut stack, state.balance(&tx.address))?,
            op::BASEFEE => push(&mut stack, block.base_fee)?,

            // ── Stack / memory ───────────────────────────────────────────
            op::POP => {
                pop(&mut stack)?;
            }
            op::MLOAD => {
                let offset = pop(&mut stack)?;
                let v = mem.load32(to_usize(&offset)?)?;
                push(&mut stack, v)?;
            }
            op::MSTORE => {
                let offset = pop(&mut stack)?;
                let value = pop(&mut stack)?;
                mem.store32(to_usize(&offset)?, value)?;
            }
            op::MSTORE8 => {
                let offset = pop(&mut stack)?;
                let value = pop(&mut stack)?;
                mem.store8(to_usize(&offset)?, value.byte(0))?;
            }
            op::MSIZE => push(&mut stack, U256::from(mem.size()))?,

            // ── Storage ──────────────────────────────────────────────────
            op::SLOAD => {
                let key = pop(&mut stack)?;
                push(&mut stack, state.sload(&tx.address, &key))?;
            }
            op::SSTORE => {
                if !writable {
                    return Err(VmError::WriteProtection);
                }
                let key = pop(&mut stack)?;
                let value = pop(&mut stack)?;
                state.sstore(&tx.address, key, value);
            }

            // ── Control flow ─────────────────────────────────────────────
            op::JUMP => {
                let dest = pop(&mut stack)?;
                pc = take_jump(&dest, &jumpdests)?;
            }
            op::JUMPI => {
                let dest = pop(&mut stack)?;
                let cond = pop(&mut stack)?;
                if !cond.is_zero() {
                    pc = take_jump(&dest, &jumpdests)?;
                }
            }
            op::PC => push(&mut stack, U256::from(pc - 1))?,
            op::GAS => push(&mut stack, U256::MAX)?,
            op::JUMPDEST => {}

            // PUSH1..PUSH32: immediates past the end of code read as zero.
            op::PUSH1..=op::PUSH32 => {
                let n = (opcode - op::PUSH1 + 1) as usize;
                let mut buf = [0u8; 32];
                for i in 0..n {
                    if pc + i < code.len() {
                        buf[32 - n + i] = code[pc + i];
                    }
                }
                pc += n;
                push(&mut stack, U256::from_big_endian(&buf))?;
            }

            // DUP1..DUP16
            op::DUP1..=op::DUP16 => {
                let n = (opcode - op::DUP1 + 1) as usize;
                if stack.len() < n {
                    return Err(VmError::StackUnderflow);
                }
                let v = stack[stack.len() - n];
                push(&mut stack, v)?;
            }

            // SWAP1..SWAP16
            op::SWAP1..=op::SWAP16 => {
                let n = (opcode - op::SWAP1 + 1) as usize;
                let len = stack.len();
                if len < n + 1 {
                    return Err(VmError::StackUnderflow);
                }
                stack.swap(len - 1, len - 1 - n);
            }

            // ── Logging ──────────────────────────────────────────────────
            op::LOG0..=op::LOG4 => {
                if !writable {
                    return Err(VmError::WriteProtection);
                }
                let n_topics = (opcode - op::LOG0) as usize;
                let offset = pop(&mut stack)?;
                let size = pop(&mut stack)?;
                let mut topics = Vec::with_capacity(n_topics);
                for _ in 0..n_topics {
                    topics.push(pop(&mut stack)?);
                }
                let data = mem.read_range(to_usize(&offset)?, to_usize(&size)?)?;
                logs.push(LogRecord { address: tx.address, topics, data });
            }

            // ── Calls ────────────────────────────────────────────────────
            op::CALL | op::CALLCODE | op::DELEGATECALL | op::STATICCALL => {
                if opcode == op::CALL && !writable {
                    return Err(VmError::WriteProtection);
                }
                // Gas is unbounded; the operand is popped and discarded.
                let _gas = pop(&mut stack)?;
                let target = word_to_address(&pop(&mut stack)?);
                let value = if opcode == op::CALL || opcode == op::CALLCODE {
                    pop(&mut stack)?
                } else {
                    U256::zero()
                };
                let args_offset = pop(&mut stack)?;
                let args_size = pop(&mut stack)?;
                let ret_offset = pop(&mut stack)?;
                let ret_size = pop(&mut stack)?;

                let calldata = mem.read_range(to_usize(&args_offset)?, to_usize(&args_size)?)?;
                let callee_code = state.code(&target);
                let sub_tx = match opcode {
                    op::CALL => TxContext {
                        address:   target,
                        caller:    tx.address,
                        origin:    tx.origin,
                        gas_price: tx.gas_price,
                        value,
                        data:      calldata,
                    },
                    op::CALLCODE => TxContext {
                        address:   tx.address,
                        caller:    tx.address,
                        origin:    tx.origin,
                        gas_price: tx.gas_price,
                        value,
                        data:      calldata,
                    },
                    op::DELEGATECALL => TxContext {
                        address:   tx.address,
                        caller:    tx.caller,
                        origin:    tx.origin,
                        gas_price: tx.gas_price,
                        value:     tx.value,
                        data:      calldata,
                    },
                    _ => TxContext {
                        address:   target,
                        caller:    tx.address,
                        origin:    tx.origin,
                        gas_price: tx.gas_price,
                        value:     U256::zero(),
                        data:      calldata,
                    },
                };
                let sub_writable = if opcode == op::STATICCALL { false } else { writable };
                let transfer = if opcode == op::CALL && !value.is_zero() {
                    Some((tx.address, target, value))
                } else {
                    None
                };
                let (ok, ret, sub_logs) =
                    run_subcall(&callee_code, &sub_tx, block, state, sub_writable, depth + 1, transfer);
                if !ret.is_empty() && !ret_size.is_zero() {
                    let n = to_usize(&ret_size)?.min(ret.len());
                    mem.write_range(to_usize(&ret_offset)?, &ret[..n])?;
                }
                sub_return = ret;
                logs.extend(sub_logs);
                push(&mut stack, bool_word(ok))?;
            }

            // ── Creates ──────────────────────────────────────────────────
            op::CREATE | op::CREATE2 => {
                if !writable {
                    return Err(VmError::WriteProtection);
                }
                let value = pop(&mut stack)?;
                let offset = pop(&mut stack)?;
                let size = pop(&mut stack)?;
                let salt = if opcode == op::CREATE2 { Some(pop(&mut stack)?) } else { None };
                let initcode = mem.read_range(to_usize(&offset)?, to_usize(&size)?)?;
                let created = match &salt {
                    Some(salt) => create2_address(&tx.address, salt, &initcode),
                    None => create_address(&tx.address, state.nonce(&tx.address)),
                };
                let (ok, ret, sub_logs) =
                    run_create(created, &initcode, value, tx, block, state, depth + 1);
                sub_return = ret;
                logs.extend(sub_logs);
                push(&mut stack, if ok { address_to_word(&created) } else { U256::zero() })?;
            }

            // ── Halts ────────────────────────────────────────────────────
            op::RETURN => {
                let offset = pop(&mut stack)?;
                let size = pop(&mut stack)?;
                let data = mem.read_range(to_usize(&offset)?, to_usize(&size)?)?;
                return Ok(FrameOutput { stack, return_data: data, reverted: false, logs });
            }
            op::REVERT => {
                let offset = pop(&mut stack)?;
                let size = pop(&mut stack)?;
                let data = mem.read_range(to_usize(&offset)?, to_usize(&size)?)?;
                return Ok(FrameOutput { stack, return_data: data, reverted: true, logs });
            }
            op::INVALID => {
                return Err(VmError::InvalidOpcode(op::INVALID));
            }
            op::SELFDESTRUCT => {
                if !writable {
                    return Err(VmError::WriteProtection);
                }
                let beneficiary = word_to_address(&pop(&mut stack)?);
                let balance = state.balance(&tx.address);
                state.credit(&beneficiary, balance);
                // Crediting self first means a self-beneficiary burns with
                // the account.
                state.accounts.remove(&tx.address);
                return Ok(FrameOutput { stack, return_data: vec![], reverted: false, logs });
            }

            // Unassigned opcodes are no-ops.
            _ => {}
        }
    }

    Ok(FrameOutput { stack, return_data: vec![], reverted: false, logs })
}

/// Validate a jump target and return the pc following the JUMPDEST.
fn take_jump(dest: &U256, jumpdests: &HashSet<usize>) -> Result<usize, VmError> {
    if dest.bits() > 64 {
        return Err(VmError::InvalidJump(usize::MAX));
    }
    let d = dest.low_u64() as usize;
    if !jumpdests.contains(&d) {
        return Err(VmError::InvalidJump(d));
    }
    Ok(d + 1)
}
