//! Ember Archive - Element graph serialization
//!
//! Archives read and write `Element` graphs field-by-field through `Class`
//! metadata. Two formats are provided: a TOML text archive and a
//! length-prefixed binary archive. Both stamp records with class
//! fingerprints and tolerate layout skew by matching fields by name.

mod binary;
mod text;

pub use binary::{
    load_binary, load_binary_bytes, save_binary, save_binary_bytes, BINARY_VERSION,
};
pub use text::{load_text, load_text_string, save_text, save_text_string, TEXT_VERSION};
