//! Display projections for decoded products
//!
//! Each helper returns the description of one field, or a fixed fallback
//! label when that field is empty.

use epw_types::{AttributeEntry, DecodedProduct};

pub const NO_FAMILY: &str = "Sem família";
pub const NO_MODEL: &str = "Sem modelo";
pub const NO_FINISH: &str = "Sem acabamento";
pub const NO_COLOR: &str = "Sem cor";
pub const NO_LENGTH: &str = "Sem comprimento";

fn label(entry: &AttributeEntry, fallback: &str) -> String {
    if !entry.description.trim().is_empty() {
        entry.description.clone()
    } else if !entry.code.trim().is_empty() {
        entry.code.clone()
    } else {
        fallback.to_string()
    }
}

/// Product family (the type segment)
pub fn family_label(product: &DecodedProduct) -> String {
    label(&product.kind, NO_FAMILY)
}

pub fn model_label(product: &DecodedProduct) -> String {
    label(&product.model, NO_MODEL)
}

pub fn finish_label(product: &DecodedProduct) -> String {
    label(&product.finish, NO_FINISH)
}

pub fn color_label(product: &DecodedProduct) -> String {
    label(&product.color, NO_COLOR)
}

pub fn length_label(product: &DecodedProduct) -> String {
    label(&product.length, NO_LENGTH)
}
