//! Segment parser for EPW codes
//!
//! Layout, read right to left:
//!
//! ```text
//!   R S C 2 3 C L 0 1
//!   └─┬─┘ └┬┘ │ │ └┬┘
//!   front  │  │ │  variant (ignored)
//!          │  │ finish
//!          │  color
//!          length
//! ```
//!
//! The front part holds type + certification + model. Type is 1 or 2
//! characters wide, so both splits are scored against the describer and the
//! better one wins; ties go to the 1-character type.

use crate::resolver::Describe;
use epw_types::{
    AttributeClass, AttributeEntry, DecodedProduct, SegmentError, SplitCandidate, SplitStrategy,
    SplitTrace,
};
use tracing::debug;

/// Shortest code with a non-empty front part
pub const MIN_CODE_LENGTH: usize = 7;
/// Longest code the decoder accepts
pub const MAX_CODE_LENGTH: usize = 11;

/// Trailing variant / sequence characters, never decoded
const VARIANT_WIDTH: usize = 2;
/// finish (1) + color (1) + length (2)
const FIXED_WIDTH: usize = 4;
/// Points per front segment that resolves to a real description
const MATCH_SCORE: u32 = 3;

/// Raw codes for all six segments
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SegmentCodes {
    pub tipo: String,
    pub certif: String,
    pub modelo: String,
    pub comprim: String,
    pub cor: String,
    pub acabamento: String,
}

impl SegmentCodes {
    pub fn get(&self, class: AttributeClass) -> &str {
        match class {
            AttributeClass::Tipo => &self.tipo,
            AttributeClass::Certif => &self.certif,
            AttributeClass::Modelo => &self.modelo,
            AttributeClass::Comprim => &self.comprim,
            AttributeClass::Cor => &self.cor,
            AttributeClass::Acabamento => &self.acabamento,
        }
    }

    /// Resolve every segment into a product
    pub fn describe_with(&self, describer: &(impl Describe + ?Sized)) -> DecodedProduct {
        let mut product = DecodedProduct::default();
        for class in AttributeClass::ALL {
            let code = self.get(class);
            product.set(class, AttributeEntry::new(code, describer.describe(class, code)));
        }
        product
    }
}

/// Split result plus the disambiguation trace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedSegments {
    pub codes: SegmentCodes,
    pub trace: SplitTrace,
}

/// Split a normalized code into its six raw segments
pub fn split_segments(
    code: &str,
    describer: &(impl Describe + ?Sized),
) -> Result<ParsedSegments, SegmentError> {
    let chars: Vec<char> = code.chars().collect();

    if let Some((position, ch)) = chars
        .iter()
        .enumerate()
        .find(|(_, c)| !c.is_ascii_alphanumeric())
    {
        return Err(SegmentError::InvalidCharacter { ch: *ch, position });
    }
    if chars.len() < MIN_CODE_LENGTH {
        return Err(SegmentError::TooShort { length: chars.len() });
    }

    let body = &chars[..chars.len() - VARIANT_WIDTH];
    let fixed_start = body.len() - FIXED_WIDTH;
    let front = &body[..fixed_start];
    let fixed = &body[fixed_start..];

    let candidates = vec![
        score_candidate(front, SplitStrategy::SingleCharType, describer),
        score_candidate(front, SplitStrategy::DoubleCharType, describer),
    ];
    let chosen = if candidates[1].score > candidates[0].score {
        SplitStrategy::DoubleCharType
    } else {
        SplitStrategy::SingleCharType
    };

    for candidate in &candidates {
        debug!(
            "{}: {:?} tipo={:?} certif={:?} modelo={:?} score={}",
            code,
            candidate.strategy,
            candidate.tipo,
            candidate.certif,
            candidate.modelo,
            candidate.score
        );
    }

    let winner = candidates
        .iter()
        .find(|c| c.strategy == chosen)
        .cloned()
        .unwrap_or_else(|| candidates[0].clone());

    let codes = SegmentCodes {
        tipo: winner.tipo,
        certif: winner.certif,
        modelo: winner.modelo,
        comprim: fixed[..2].iter().collect(),
        cor: fixed[2].to_string(),
        acabamento: fixed[3].to_string(),
    };

    Ok(ParsedSegments {
        codes,
        trace: SplitTrace {
            front: front.iter().collect(),
            candidates,
            chosen,
        },
    })
}

/// Split and describe in one go
pub fn decode_segments(
    code: &str,
    describer: &(impl Describe + ?Sized),
) -> Result<(DecodedProduct, SplitTrace), SegmentError> {
    let parsed = split_segments(code, describer)?;
    Ok((parsed.codes.describe_with(describer), parsed.trace))
}

/// Build one candidate split; short fronts yield partial (possibly empty) segments
fn score_candidate(
    front: &[char],
    strategy: SplitStrategy,
    describer: &(impl Describe + ?Sized),
) -> SplitCandidate {
    let type_end = strategy.type_width().min(front.len());
    let certif_end = (type_end + 1).min(front.len());

    let tipo: String = front[..type_end].iter().collect();
    let certif: String = front[type_end..certif_end].iter().collect();
    let modelo: String = front[certif_end..].iter().collect();

    let score = [
        (AttributeClass::Tipo, &tipo),
        (AttributeClass::Certif, &certif),
        (AttributeClass::Modelo, &modelo),
    ]
    .iter()
    .filter(|(class, code)| !code.is_empty() && describer.describe(*class, code) != **code)
    .count() as u32
        * MATCH_SCORE;

    SplitCandidate {
        strategy,
        tipo,
        certif,
        modelo,
        score,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::StaticDescriber;

    #[test]
    fn test_fixed_segments_are_stripped_right_to_left() {
        let parsed = split_segments("RSC23CL01", &StaticDescriber).unwrap();

        assert_eq!(parsed.codes.acabamento, "L");
        assert_eq!(parsed.codes.cor, "C");
        assert_eq!(parsed.codes.comprim, "23");
        assert_eq!(parsed.trace.front, "RSC");
    }

    #[test]
    fn test_single_char_type_wins_for_rsc() {
        let parsed = split_segments("RSC23CL01", &StaticDescriber).unwrap();

        // A: R=Régua, S=Sem, C=Clássico -> 9; B: RS unknown, C=Certificado CE, "" -> 3
        assert_eq!(parsed.trace.chosen, SplitStrategy::SingleCharType);
        assert_eq!(parsed.trace.candidates[0].score, 9);
        assert_eq!(parsed.trace.candidates[1].score, 3);
        assert_eq!(parsed.codes.tipo, "R");
        assert_eq!(parsed.codes.certif, "S");
        assert_eq!(parsed.codes.modelo, "C");
    }

    #[test]
    fn test_double_char_type_wins_when_it_scores_higher() {
        let parsed = split_segments("CHSM23CL01", &StaticDescriber).unwrap();

        // A: C=Calha, H unknown, SM unknown -> 3; B: CH=Chapa, S=Sem, M=Moderno -> 9
        assert_eq!(parsed.trace.chosen, SplitStrategy::DoubleCharType);
        assert_eq!(parsed.codes.tipo, "CH");
        assert_eq!(parsed.codes.certif, "S");
        assert_eq!(parsed.codes.modelo, "M");
    }

    #[test]
    fn test_zero_scores_default_to_single_char_type() {
        let parsed = split_segments("ZZZZ99ZZ01", &StaticDescriber).unwrap();

        assert!(parsed.trace.candidates.iter().all(|c| c.score == 0));
        assert_eq!(parsed.trace.chosen, SplitStrategy::SingleCharType);
        assert_eq!(parsed.codes.tipo, "Z");
        assert_eq!(parsed.codes.certif, "Z");
        assert_eq!(parsed.codes.modelo, "ZZ");
    }

    #[test]
    fn test_one_char_front_is_a_partial_split() {
        let parsed = split_segments("R23CL01", &StaticDescriber).unwrap();

        assert_eq!(parsed.trace.front, "R");
        assert_eq!(parsed.codes.tipo, "R");
        assert_eq!(parsed.codes.certif, "");
        assert_eq!(parsed.codes.modelo, "");
    }

    #[test]
    fn test_last_two_characters_are_never_attributed() {
        let a = split_segments("RSC23CL01", &StaticDescriber).unwrap();
        let b = split_segments("RSC23CL99", &StaticDescriber).unwrap();
        assert_eq!(a.codes, b.codes);
    }

    #[test]
    fn test_rejects_non_alphanumeric() {
        assert_eq!(
            split_segments("RSC 23CL01", &StaticDescriber),
            Err(SegmentError::InvalidCharacter {
                ch: ' ',
                position: 3
            })
        );
    }

    #[test]
    fn test_rejects_too_short() {
        assert_eq!(
            split_segments("R23CL1", &StaticDescriber),
            Err(SegmentError::TooShort { length: 6 })
        );
    }

    #[test]
    fn test_decode_segments_describes_everything() {
        let (product, _) = decode_segments("RSC23CL01", &StaticDescriber).unwrap();

        assert_eq!(product.kind, AttributeEntry::new("R", "Régua"));
        assert_eq!(product.certification, AttributeEntry::new("S", "Sem"));
        assert_eq!(product.model, AttributeEntry::new("C", "Clássico"));
        assert_eq!(product.length, AttributeEntry::new("23", "2300 mm"));
        assert_eq!(product.color, AttributeEntry::new("C", "Cinza"));
        assert_eq!(product.finish, AttributeEntry::new("L", "Lacado"));
    }

    #[test]
    fn test_unknown_segments_describe_as_themselves() {
        let (product, _) = decode_segments("RS977QQ01", &StaticDescriber).unwrap();

        assert_eq!(product.length, AttributeEntry::raw("77"));
        assert_eq!(product.color, AttributeEntry::raw("Q"));
        assert_eq!(product.finish, AttributeEntry::raw("Q"));
    }
}
