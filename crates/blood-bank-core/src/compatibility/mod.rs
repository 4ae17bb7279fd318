//! ABO/Rh transfusion compatibility.
//!
//! A fixed table from recipient type to the donor types that may be
//! transfused into it, plus the order in which substitutes are tried.

use crate::models::{BloodType, InvalidBloodType};

use BloodType::*;

/// Rarest first. O- comes last so the universal donor is spent only when
/// nothing else fits.
pub const SCARCITY_ORDER: [BloodType; 8] = [AbNeg, BNeg, ANeg, AbPos, BPos, APos, OPos, ONeg];

/// Donor types that can be transfused into `recipient`. Always contains `recipient`.
pub fn compatible_types(recipient: BloodType) -> &'static [BloodType] {
    match recipient {
        ONeg => &[ONeg],
        OPos => &[ONeg, OPos],
        ANeg => &[ONeg, ANeg],
        APos => &[ONeg, OPos, ANeg, APos],
        BNeg => &[ONeg, BNeg],
        BPos => &[ONeg, OPos, BNeg, BPos],
        AbNeg => &[ONeg, ANeg, BNeg, AbNeg],
        AbPos => &[ONeg, OPos, ANeg, APos, BNeg, BPos, AbNeg, AbPos],
    }
}

/// Whether blood of type `donor` may be given to a `recipient`.
pub fn is_compatible(donor: BloodType, recipient: BloodType) -> bool {
    compatible_types(recipient).contains(&donor)
}

/// Order in which candidate types are tried when filling a request:
/// the exact type, then the other compatible types in [`SCARCITY_ORDER`].
pub fn fulfillment_priority(recipient: BloodType) -> Vec<BloodType> {
    let compatible = compatible_types(recipient);
    let mut priority = Vec::with_capacity(compatible.len());
    priority.push(recipient);
    priority.extend(
        SCARCITY_ORDER
            .iter()
            .copied()
            .filter(|t| *t != recipient && compatible.contains(t)),
    );
    priority
}

/// [`compatible_types`] keyed by label.
pub fn compatible_types_for_label(label: &str) -> Result<&'static [BloodType], InvalidBloodType> {
    Ok(compatible_types(label.parse()?))
}

/// [`fulfillment_priority`] keyed by label.
pub fn fulfillment_priority_for_label(label: &str) -> Result<Vec<BloodType>, InvalidBloodType> {
    Ok(fulfillment_priority(label.parse()?))
}
