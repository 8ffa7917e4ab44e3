pub mod hmac_signer;


pub use hmac_signer::{AuthHeaders, CanonicalRequest, HmacSigner};
