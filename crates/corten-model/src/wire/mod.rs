//! Wire mapping between the typed model and SOAP envelopes.
//!
//! Writing and reading are deliberately asymmetric. The writer builds each
//! signed-relevant chunk (Messaging block, Body) exactly once and the final
//! envelope is assembled by splicing those strings together, so the bytes a
//! signature covers are the bytes that go on the wire. The reader never
//! re-serializes: it extracts typed values from a parsed document and leaves
//! byte-span work (digests over raw ranges) to the security layer.

pub mod read;
pub mod write;
