//! Per-frame execution environment.
//!
//! `TxContext` is derived anew for every sub-frame (the CALL-family table
//! in the interpreter); `BlockContext` is shared unchanged down the chain.

use primitive_types::{H160, U256};

/// Transaction envelope as seen by one frame. Immutable for the frame's
/// lifetime; `address` is the executing contract.
#[derive(Debug, Clone, Default)]
pub struct TxContext {
    pub address:   H160,
    pub caller:    H160,
    pub origin:    H160,
    pub gas_price: U256,
    pub value:     U256,
    pub data:      Vec<u8>,
}

/// Block header fields visible to the machine. Immutable.
#[derive(Debug, Clone, Default)]
pub struct BlockContext {
    pub coinbase:   H160,
    pub base_fee:   U256,
    pub timestamp:  U256,
    pub number:     U256,
    pub difficulty: U256,
    pub gas_limit:  U256,
    pub chain_id:   U256,
}
