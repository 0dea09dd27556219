// Copyright (c) 2018-2022 The Botho Foundation

/// Domain separator for subaddress scalar derivation, matching Monero's
/// `"SubAddr\0"` tag.
pub const SUBADDRESS_DOMAIN_TAG: &[u8] = b"SubAddr\0";
