//! Certificate signer implementations

pub mod ssh_keygen;
