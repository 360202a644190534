use super::BoxPx;

/// Decodes `"x1,y1,x2,y2"` into a box.
///
/// Every token must be a base-10 integer once trimmed, and there must be
/// exactly four of them. Out-of-image or degenerate boxes pass through
/// untouched.
pub fn parse_coords(descriptor: &str) -> Option<BoxPx> {
    let values = descriptor
        .split(',')
        .map(|part| part.trim().parse::<i32>().ok())
        .collect::<Option<Vec<_>>>()?;
    let [x1, y1, x2, y2] = values.as_slice() else {
        return None;
    };
    Some(BoxPx {
        x1: *x1,
        y1: *y1,
        x2: *x2,
        y2: *y2,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_four_integers() {
        let bbox = parse_coords("100,100,400,160").expect("bbox");
        assert_eq!(
            bbox,
            BoxPx {
                x1: 100,
                y1: 100,
                x2: 400,
                y2: 160
            }
        );
    }

    #[test]
    fn trims_whitespace_around_tokens() {
        let bbox = parse_coords(" 10 , 20,\t30 ,40 ").expect("bbox");
        assert_eq!((bbox.x1, bbox.y1, bbox.x2, bbox.y2), (10, 20, 30, 40));
    }

    #[test]
    fn keeps_negative_and_out_of_range_values() {
        let bbox = parse_coords("-5,-5,5000,9000").expect("bbox");
        assert_eq!((bbox.x1, bbox.y1, bbox.x2, bbox.y2), (-5, -5, 5000, 9000));
        let degenerate = parse_coords("10,10,10,10").expect("degenerate bbox");
        assert_eq!(degenerate.width(), 0.0);
    }

    #[test]
    fn rejects_wrong_token_count() {
        assert!(parse_coords("1,2,3").is_none());
        assert!(parse_coords("1,2,3,4,5").is_none());
        assert!(parse_coords("").is_none());
        assert!(parse_coords("1,2,3,4,").is_none());
    }

    #[test]
    fn rejects_non_integer_tokens() {
        assert!(parse_coords("1,2,3,x").is_none());
        assert!(parse_coords("1.5,2,3,4").is_none());
        assert!(parse_coords("1,,3,4").is_none());
        assert!(parse_coords("12px,2,3,4").is_none());
    }
}
