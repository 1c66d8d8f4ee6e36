//! ABI of the attestation contract and typed call encoding.
//!
//! The contract maps a fingerprint (lowercase hex string) to the locator of
//! the uploaded document. `storeDiploma` reverts when the fingerprint is
//! already attested.

use ethers::abi::{Abi, Token};
use ethers::contract::BaseContract;
use ethers::types::Bytes;

use credchain_core::{ContentLocator, Fingerprint};

use crate::error::{LedgerError, Result};

/// Contract ABI, restricted to the functions credchain calls.
pub const CONTRACT_ABI: &str = r#"[
  {
    "inputs": [
      { "internalType": "string", "name": "_diplomaHash", "type": "string" },
      { "internalType": "string", "name": "_arweaveTxId", "type": "string" }
    ],
    "name": "storeDiploma",
    "outputs": [{ "internalType": "uint256", "name": "", "type": "uint256" }],
    "stateMutability": "nonpayable",
    "type": "function"
  },
  {
    "inputs": [
      { "internalType": "string", "name": "_diplomaHash", "type": "string" }
    ],
    "name": "verifyDiploma",
    "outputs": [
      { "internalType": "bool", "name": "exists", "type": "bool" },
      { "internalType": "string", "name": "arweaveTxId", "type": "string" }
    ],
    "stateMutability": "view",
    "type": "function"
  }
]"#;

const STORE: &str = "storeDiploma";
const VERIFY: &str = "verifyDiploma";

/// Typed encoder/decoder for the attestation contract.
#[derive(Debug, Clone)]
pub struct AttestationContract {
    base: BaseContract,
}

impl AttestationContract {
    pub fn new() -> Result<Self> {
        let abi = Abi::load(CONTRACT_ABI.as_bytes()).map_err(|e| LedgerError::Abi(e.to_string()))?;
        Ok(Self {
            base: BaseContract::from(abi),
        })
    }

    /// Calldata for `verifyDiploma(fingerprint)`.
    pub fn encode_verify(&self, fingerprint: &Fingerprint) -> Result<Bytes> {
        Ok(self.base.encode(VERIFY, fingerprint.to_hex())?)
    }

    /// Decode the `(exists, locator)` pair returned by `verifyDiploma`.
    pub fn decode_verify_output(&self, output: &Bytes) -> Result<(bool, String)> {
        Ok(self.base.decode_output(VERIFY, output)?)
    }

    /// Calldata for `storeDiploma(fingerprint, locator)`.
    pub fn encode_store(&self, fingerprint: &Fingerprint, locator: &ContentLocator) -> Result<Bytes> {
        Ok(self
            .base
            .encode(STORE, (fingerprint.to_hex(), locator.as_str().to_string()))?)
    }

    /// Decode `storeDiploma` calldata back into `(fingerprint, locator)`.
    pub fn decode_store_input(&self, calldata: &Bytes) -> Result<(String, String)> {
        Ok(self.base.decode(STORE, calldata)?)
    }

    /// Whether `calldata` targets `verifyDiploma`.
    pub fn is_verify_call(&self, calldata: &Bytes) -> bool {
        self.selector_matches(VERIFY, calldata)
    }

    /// Whether `calldata` targets `storeDiploma`.
    pub fn is_store_call(&self, calldata: &Bytes) -> bool {
        self.selector_matches(STORE, calldata)
    }

    /// Decode `verifyDiploma` calldata into the queried fingerprint.
    pub fn decode_verify_input(&self, calldata: &Bytes) -> Result<String> {
        Ok(self.base.decode(VERIFY, calldata)?)
    }

    /// ABI-encode a `verifyDiploma` return value.
    pub fn encode_verify_output(exists: bool, locator: &str) -> Bytes {
        ethers::abi::encode(&[Token::Bool(exists), Token::String(locator.to_string())]).into()
    }

    fn selector_matches(&self, name: &str, calldata: &Bytes) -> bool {
        match self.base.abi().function(name) {
            Ok(function) => calldata.len() >= 4 && calldata[..4] == function.short_signature(),
            Err(_) => false,
        }
    }
}
