//! Purpose: Map 96-well plate identifiers (`A1`..`H12`) to linear positions.
//! Exports: `well_position`.
//! Invariants: Row-major numbering, `A1` = 1 and `H12` = 96.

/// Linear position of a well identifier on a 96-well plate, or `None` for
/// anything outside the `A1`..`H12` grid.
pub fn well_position(well: &str) -> Option<u32> {
    let well = well.trim();
    let mut chars = well.chars();
    let row_char = chars.next()?;
    let row = match row_char.to_ascii_uppercase() {
        c @ 'A'..='H' => (c as u32) - ('A' as u32) + 1,
        _ => return None,
    };
    let column: u32 = chars.as_str().parse().ok()?;
    if !(1..=12).contains(&column) {
        return None;
    }
    Some((row - 1) * 12 + column)
}

#[cfg(test)]
mod tests {
    use super::well_position;

    #[test]
    fn corners_map_to_expected_positions() {
        assert_eq!(well_position("A1"), Some(1));
        assert_eq!(well_position("A12"), Some(12));
        assert_eq!(well_position("B1"), Some(13));
        assert_eq!(well_position("H12"), Some(96));
    }

    #[test]
    fn lowercase_and_padding_are_tolerated() {
        assert_eq!(well_position("c7"), Some(31));
        assert_eq!(well_position(" D10 "), Some(46));
    }

    #[test]
    fn invalid_identifiers_are_rejected() {
        for bad in ["", "Z9", "A0", "A13", "5", "AA1", "A1.5"] {
            assert_eq!(well_position(bad), None, "{bad}");
        }
    }
}
