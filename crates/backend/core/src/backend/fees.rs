//! Fee suggestions.

use crate::{BackendResult, BackendTypes, ChainSpecReader, EthBackend, FeeOracle, HeaderReader};
use alloy_eips::BlockNumberOrTag;
use alloy_primitives::U256;
use alloy_rpc_types_eth::FeeHistory;

impl<N: BackendTypes> EthBackend<N> {
    /// Suggests a priority fee for a transaction to be included in the next block.
    pub async fn suggest_gas_tip_cap(&self) -> BackendResult<U256> {
        Ok(self.oracle().suggest_tip_cap().await?)
    }

    /// Returns the fee history of `block_count` blocks ending at `last_block`, with the given
    /// reward percentiles.
    pub async fn fee_history(
        &self,
        block_count: u64,
        last_block: BlockNumberOrTag,
        reward_percentiles: &[f64],
    ) -> BackendResult<FeeHistory> {
        Ok(self.oracle().fee_history(block_count, last_block, reward_percentiles).await?)
    }

    /// Returns the blob base fee for the block after the current header, or `None` before blob
    /// transactions activate.
    pub fn blob_base_fee(&self) -> Option<u128> {
        let header = self.chain().current_header();
        let excess_blob_gas = header.excess_blob_gas?;
        let params = self.chain().blob_params_at_timestamp(header.timestamp)?;
        Some(params.calc_blob_fee(excess_blob_gas))
    }
}
