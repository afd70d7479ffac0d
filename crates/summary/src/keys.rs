//! The byte-store key schema.
//!
//! Three artifact families, each keyed by the digest that makes the artifact
//! reusable:
//!
//! - `<contentHashHex>.unlinked`: the unlinked summary of any file with that
//!   content.
//! - `<dependencySignatureHex>.linked`: the linked summary of the library
//!   with that dependency signature.
//! - `<combinedHex>.errors`: the diagnostic list for a particular
//!   (dependency signature, content hash) pairing.

use kiln_source::ContentHash;
use kiln_source::digest;

pub fn unlinked_key(hash: &ContentHash) -> String {
    format!("{hash}.unlinked")
}

pub fn linked_key(dependency_signature: &str) -> String {
    format!("{dependency_signature}.linked")
}

pub fn errors_key(dependency_signature: &str, hash: &ContentHash) -> String {
    let combined = digest::md5_hex([dependency_signature.as_bytes(), hash.as_hex().as_bytes()]);

    format!("{combined}.errors")
}
