// Copyright (c) 2018-2022 The Botho Foundation

//! Host-supplied bounds the engine enforces but never reads from a file
//! or environment — the device is headless and driven entirely by the
//! host's protocol messages.

/// Limits and policy the embedder pins before constructing a
/// [`crate::state::SigningState`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SignerConfig {
    /// Hard ceiling on `num_inputs`, rejected at `Init`.
    pub max_inputs: usize,
    /// Hard ceiling on the number of declared outputs, rejected at
    /// `Init`.
    pub max_outputs: usize,
    /// Require `TsxData::exp_tx_prefix_hash` to be present and match at
    /// `AllOutputsSet`. Multisig co-signing restarts rely on this; a
    /// single-signer wallet normally leaves it unset.
    pub require_exp_tx_prefix_hash: bool,
}

impl Default for SignerConfig {
    fn default() -> Self {
        SignerConfig {
            max_inputs: 16,
            max_outputs: 16,
            require_exp_tx_prefix_hash: false,
        }
    }
}
