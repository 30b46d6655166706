use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Glue flap added along the unfolded length, in millimetres.
pub const GLUE_FLAP_MM: u32 = 25;

/// Widest corrugated sheet the plant can feed. Anything wider still gets a
/// price; it is flagged so an operator reviews it before committing.
pub const MAX_SHEET_WIDTH_MM: u32 = 1200;

/// Interior dimensions of a regular slotted box, in millimetres.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoxDimensions {
    pub length_mm: u32,
    pub width_mm: u32,
    pub height_mm: u32,
}

/// Flat cut sheet obtained by unfolding one box.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetLayout {
    pub width_mm: u32,
    pub length_mm: u32,
    /// Exact sheet area in square metres, six decimal places.
    pub area_m2: Decimal,
    pub oversized: bool,
}

/// Sheet width: the box height plus one width, the two panels that wrap
/// around the open face.
pub fn sheet_width_mm(dimensions: &BoxDimensions) -> u32 {
    dimensions.height_mm + dimensions.width_mm
}

/// Sheet length: all four side panels plus the glue flap.
pub fn sheet_length_mm(dimensions: &BoxDimensions) -> u32 {
    2 * dimensions.length_mm + 2 * dimensions.width_mm + GLUE_FLAP_MM
}

pub fn is_oversized(dimensions: &BoxDimensions) -> bool {
    sheet_width_mm(dimensions) > MAX_SHEET_WIDTH_MM
}

/// mm * mm = mm^2, and 1 m^2 = 1_000_000 mm^2, so scaling the integer
/// product by six decimal places yields an exact area.
fn sheet_area_m2(width_mm: u32, length_mm: u32) -> Decimal {
    Decimal::new(i64::from(width_mm) * i64::from(length_mm), 6)
}

pub fn unfold(dimensions: &BoxDimensions) -> SheetLayout {
    let width_mm = sheet_width_mm(dimensions);
    let length_mm = sheet_length_mm(dimensions);
    SheetLayout {
        width_mm,
        length_mm,
        area_m2: sheet_area_m2(width_mm, length_mm),
        oversized: width_mm > MAX_SHEET_WIDTH_MM,
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use crate::geometry::{is_oversized, unfold, BoxDimensions, MAX_SHEET_WIDTH_MM};

    #[test]
    fn unfold_follows_the_cut_sheet_formula() {
        let sheet = unfold(&BoxDimensions { length_mm: 400, width_mm: 300, height_mm: 200 });

        assert_eq!(sheet.width_mm, 500);
        assert_eq!(sheet.length_mm, 1425);
        // 500mm x 1425mm = 712_500 mm^2 = 0.7125 m^2 exactly.
        assert_eq!(sheet.area_m2, Decimal::new(712_500, 6));
        assert!(!sheet.oversized);
    }

    #[test]
    fn oversize_flag_flips_just_past_the_sheet_width_limit() {
        let at_limit = BoxDimensions { length_mm: 500, width_mm: 600, height_mm: 600 };
        let past_limit = BoxDimensions { length_mm: 500, width_mm: 600, height_mm: 601 };

        assert_eq!(unfold(&at_limit).width_mm, MAX_SHEET_WIDTH_MM);
        assert!(!is_oversized(&at_limit));
        assert!(is_oversized(&past_limit));
    }

    #[test]
    fn area_grows_monotonically_with_each_axis() {
        let base = BoxDimensions { length_mm: 400, width_mm: 300, height_mm: 200 };
        let area = unfold(&base).area_m2;

        for grown in [
            BoxDimensions { length_mm: 401, ..base },
            BoxDimensions { width_mm: 301, ..base },
            BoxDimensions { height_mm: 201, ..base },
        ] {
            assert!(unfold(&grown).area_m2 > area);
        }
    }

    #[test]
    fn area_matches_the_integer_millimetre_product() {
        let sheet = unfold(&BoxDimensions { length_mm: 123, width_mm: 457, height_mm: 89 });
        let expected_mm2 = i64::from(sheet.width_mm) * i64::from(sheet.length_mm);
        assert_eq!(sheet.area_m2, Decimal::new(expected_mm2, 6));
    }
}
