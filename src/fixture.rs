//! JSON test-vector surface.
//!
//! Each fixture carries bytecode as hex (`code.bin`), optional transaction,
//! block, and pre-state sections, and an `expect` block: success flag,
//! stack (top first), return payload, and logs. `check` runs the
//! interpreter over the decoded inputs and reports the first mismatch.

use crate::vm::context::{BlockContext, TxContext};
use crate::vm::interpreter::{self, ExecResult};
use crate::vm::state::{Account, WorldState};
use primitive_types::{H160, U256};
use serde::Deserialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Deserialize)]
pub struct Fixture {
    #[serde(default)]
    pub name:  Option<String>,
    pub code:  CodeBlob,
    #[serde(default)]
    pub tx:    Option<TxFields>,
    #[serde(default)]
    pub block: Option<BlockFields>,
    #[serde(default)]
    pub state: Option<BTreeMap<String, AccountFields>>,
    pub expect: Expect,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CodeBlob {
    pub bin: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TxFields {
    #[serde(default)]
    pub to:       Option<String>,
    #[serde(default)]
    pub from:     Option<String>,
    #[serde(default)]
    pub origin:   Option<String>,
    #[serde(default)]
    pub gasprice: Option<String>,
    #[serde(default)]
    pub value:    Option<String>,
    #[serde(default)]
    pub data:     Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BlockFields {
    #[serde(default)]
    pub coinbase:   Option<String>,
    #[serde(default)]
    pub basefee:    Option<String>,
    #[serde(default)]
    pub timestamp:  Option<String>,
    #[serde(default)]
    pub number:     Option<String>,
    #[serde(default)]
    pub difficulty: Option<String>,
    #[serde(default)]
    pub gaslimit:   Option<String>,
    #[serde(default)]
    pub chainid:    Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AccountFields {
    #[serde(default)]
    pub balance: Option<String>,
    #[serde(default)]
    pub nonce:   Option<String>,
    #[serde(default)]
    pub code:    Option<CodeBlob>,
    #[serde(default)]
    pub storage: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Expect {
    pub success: bool,
    #[serde(default)]
    pub stack:   Option<Vec<String>>,
    #[serde(default, rename = "return")]
    pub ret:     Option<String>,
    #[serde(default)]
    pub logs:    Option<Vec<LogFields>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogFields {
    pub address: String,
    pub data:    String,
    #[serde(default)]
    pub topics:  Vec<String>,
}

/// Parse a JSON array of fixtures.
pub fn load(text: &str) -> serde_json::Result<Vec<Fixture>> {
    serde_json::from_str(text)
}

// ── Hex helpers ───────────────────────────────────────────────────────────

/// Hex string → bytes; tolerates a 0x prefix and odd digit counts.
pub fn parse_bytes(s: &str) -> Vec<u8> {
    let t = s.trim_start_matches("0x");
    if t.len() % 2 == 1 {
        hex::decode(format!("0{t}")).unwrap_or_default()
    } else {
        hex::decode(t).unwrap_or_default()
    }
}

/// Hex quantity → word. Empty or malformed input reads as 0.
pub fn parse_word(s: &str) -> U256 {
    let t = s.trim_start_matches("0x");
    if t.is_empty() {
        return U256::zero();
    }
    U256::from_str_radix(t, 16).unwrap_or_default()
}

/// Hex string → 20-byte address; shorter inputs are left-padded, longer
/// ones keep their low 20 bytes.
pub fn parse_address(s: &str) -> H160 {
    let bytes = parse_bytes(s);
    let mut buf = [0u8; 20];
    if bytes.len() >= 20 {
        buf.copy_from_slice(&bytes[bytes.len() - 20..]);
    } else {
        buf[20 - bytes.len()..].copy_from_slice(&bytes);
    }
    H160::from(buf)
}

impl Fixture {
    /// Decode the fixture into interpreter inputs.
    pub fn build_inputs(&self) -> (Vec<u8>, TxContext, BlockContext, WorldState) {
        let code = parse_bytes(&self.code.bin);

        let t = self.tx.clone().unwrap_or_default();
        let tx = TxContext {
            address:   t.to.as_deref().map(parse_address).unwrap_or_default(),
            caller:    t.from.as_deref().map(parse_address).unwrap_or_default(),
            origin:    t.origin.as_deref().map(parse_address).unwrap_or_default(),
            gas_price: t.gasprice.as_deref().map(parse_word).unwrap_or_default(),
            value:     t.value.as_deref().map(parse_word).unwrap_or_default(),
            data:      t.data.as_deref().map(parse_bytes).unwrap_or_default(),
        };

        let b = self.block.clone().unwrap_or_default();
        let block = BlockContext {
            coinbase:   b.coinbase.as_deref().map(parse_address).unwrap_or_default(),
            base_fee:   b.basefee.as_deref().map(parse_word).unwrap_or_default(),
            timestamp:  b.timestamp.as_deref().map(parse_word).unwrap_or_default(),
            number:     b.number.as_deref().map(parse_word).unwrap_or_default(),
            difficulty: b.difficulty.as_deref().map(parse_word).unwrap_or_default(),
            gas_limit:  b.gaslimit.as_deref().map(parse_word).unwrap_or_default(),
            chain_id:   b.chainid.as_deref().map(parse_word).unwrap_or_default(),
        };

        let mut state = WorldState::default();
        for (addr, fields) in self.state.iter().flatten() {
            let mut account = Account {
                balance: fields.balance.as_deref().map(parse_word).unwrap_or_default(),
                nonce: fields.nonce.as_deref().map(parse_word).unwrap_or_default().low_u64(),
                code: fields.code.as_ref().map(|c| parse_bytes(&c.bin)).unwrap_or_default(),
                storage: BTreeMap::new(),
            };
            for (k, v) in fields.storage.iter().flatten() {
                account.storage.insert(parse_word(k), parse_word(v));
            }
            state.accounts.insert(parse_address(addr), account);
        }

        (code, tx, block, state)
    }

    pub fn run(&self) -> ExecResult {
        let (code, tx, block, mut state) = self.build_inputs();
        interpreter::execute(&code, &tx, &block, &mut state, true)
    }

    /// Run and compare against `expect`. The error string names the first
    /// mismatching field.
    pub fn check(&self) -> Result<(), String> {
        let result = self.run();

        if result.success != self.expect.success {
            return Err(format!(
                "success: expected {}, got {}",
                self.expect.success, result.success
            ));
        }

        if let Some(expected) = &self.expect.stack {
            let want: Vec<U256> = expected.iter().map(|s| parse_word(s)).collect();
            if result.stack != want {
                return Err(format!("stack: expected {want:?}, got {:?}", result.stack));
            }
        }

        if let Some(expected) = &self.expect.ret {
            let want = parse_bytes(expected);
            if result.return_data != want {
                return Err(format!(
                    "return: expected 0x{}, got 0x{}",
                    hex::encode(&want),
                    hex::encode(&result.return_data)
                ));
            }
        }

        if let Some(expected) = &self.expect.logs {
            if result.logs.len() != expected.len() {
                return Err(format!(
                    "logs: expected {} records, got {}",
                    expected.len(),
                    result.logs.len()
                ));
            }
            for (i, (want, got)) in expected.iter().zip(&result.logs).enumerate() {
                if parse_address(&want.address) != got.address {
                    return Err(format!("logs[{i}].address mismatch"));
                }
                if parse_bytes(&want.data) != got.data {
                    return Err(format!("logs[{i}].data mismatch"));
                }
                let topics: Vec<U256> = want.topics.iter().map(|t| parse_word(t)).collect();
                if topics != got.topics {
                    return Err(format!("logs[{i}].topics mismatch"));
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bytes_tolerates_prefix_and_odd_length() {
        assert_eq!(parse_bytes("0x6001"), vec![0x60, 0x01]);
        assert_eq!(parse_bytes("6001"), vec![0x60, 0x01]);
        assert_eq!(parse_bytes("0x1"), vec![0x01]);
        assert_eq!(parse_bytes(""), Vec::<u8>::new());
    }

    #[test]
    fn test_parse_word() {
        assert_eq!(parse_word("0xff"), U256::from(255));
        assert_eq!(parse_word("10"), U256::from(16));
        assert_eq!(parse_word("0x"), U256::zero());
    }

    #[test]
    fn test_parse_address_pads_and_truncates() {
        assert_eq!(parse_address("0xff"), H160::from_low_u64_be(0xFF));
        let full = "0x00000000000000000000000011223344556677889900aabbccddeeff00112233";
        assert_eq!(
            parse_address(full),
            parse_address("0x11223344556677889900aabbccddeeff00112233")
        );
    }

    #[test]
    fn test_fixture_round_trip() {
        let text = r#"[{
            "name": "add",
            "code": { "bin": "6001600201" },
            "expect": { "success": true, "stack": ["0x3"] }
        }]"#;
        let fixtures = load(text).unwrap();
        assert_eq!(fixtures.len(), 1);
        fixtures[0].check().unwrap();
    }

    #[test]
    fn test_fixture_reports_stack_mismatch() {
        let text = r#"[{
            "code": { "bin": "6001600201" },
            "expect": { "success": true, "stack": ["0x4"] }
        }]"#;
        let fixtures = load(text).unwrap();
        let err = fixtures[0].check().unwrap_err();
        assert!(err.starts_with("stack"), "unexpected error: {err}");
    }

    #[test]
    fn test_fixture_prestate_storage() {
        let text = r#"[{
            "name": "sload from pre-state",
            "code": { "bin": "60005400" },
            "tx": { "to": "0x1000000000000000000000000000000000000aaa" },
            "state": {
                "0x1000000000000000000000000000000000000aaa": {
                    "storage": { "0x0": "0x2a" }
                }
            },
            "expect": { "success": true, "stack": ["0x2a"] }
        }]"#;
        let fixtures = load(text).unwrap();
        fixtures[0].check().unwrap();
    }
}
