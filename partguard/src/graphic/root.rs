use std::sync::LazyLock;

use regex::Regex;

use super::GraphicValidator;
use crate::diagnostics::Code;
use crate::xml::Element;

static LENGTH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([+-]?(?:\d+\.?\d*|\.\d+)(?:[eE][+-]?\d+)?)\s*([a-zA-Z%]*)\s*$").unwrap()
});

/// A `width` or `height` value.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Length {
    Inches(f64),
    /// `px` or no unit at all.
    Pixels(f64),
    Unknown(String),
}

pub(crate) fn parse_length(value: &str) -> Length {
    let Some(caps) = LENGTH_RE.captures(value) else {
        return Length::Unknown(value.trim().to_string());
    };
    let Ok(number) = caps[1].parse::<f64>() else {
        return Length::Unknown(value.trim().to_string());
    };
    match caps[2].to_ascii_lowercase().as_str() {
        "in" => Length::Inches(number),
        "mm" => Length::Inches(number / 25.4),
        "cm" => Length::Inches(number / 2.54),
        "" | "px" => Length::Pixels(number),
        other => Length::Unknown(other.to_string()),
    }
}

/// `viewBox` as four numbers, separated by whitespace and/or commas.
pub(crate) fn parse_view_box(value: &str) -> Option<[f64; 4]> {
    let numbers: Vec<f64> = value
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|s| !s.is_empty())
        .map(str::parse)
        .collect::<Result<_, _>>()
        .ok()?;
    let values: [f64; 4] = numbers.try_into().ok()?;
    if values.iter().any(|v| *v < 0.0 || !v.is_finite()) {
        return None;
    }
    Some(values)
}

fn is_close(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-5 * a.abs().max(b.abs())
}

impl GraphicValidator<'_> {
    pub(super) fn root(&mut self, element: &Element, depth: usize) {
        let is_svg = element.local_name() == "svg";
        if depth > 0 {
            if is_svg {
                self.out.at(Code::SvgRootRepeated, element.line, "more than one <svg> element");
            }
            return;
        }
        if !is_svg {
            self.out.at(
                Code::RootNotSvg,
                element.line,
                format!("first element is <{}>, expected <svg>", element.name),
            );
            return;
        }

        let width = self.dimension(element, "width");
        let height = self.dimension(element, "height");

        let Some(raw) = element.attr("viewBox") else {
            self.out.at(Code::ViewBoxMissing, element.line, "<svg> has no viewBox");
            return;
        };
        let Some([x, y, w, h]) = parse_view_box(raw) else {
            self.out.at(
                Code::ViewBoxMalformed,
                element.line,
                format!("viewBox '{}' is not four non-negative numbers", raw),
            );
            return;
        };
        if x != 0.0 || y != 0.0 {
            self.out.at(
                Code::ViewBoxOrigin,
                element.line,
                format!("viewBox origin is '{} {}', expected '0 0'", x, y),
            );
        }
        if let (Some(width), Some(height)) = (width, height) {
            if !is_close(width * 1000.0, w) || !is_close(height * 1000.0, h) {
                self.out.at(
                    Code::ScaleMismatch,
                    element.line,
                    format!(
                        "viewBox {}x{} is not 1000 per inch of {:.4}in x {:.4}in",
                        w, h, width, height
                    ),
                );
            }
        }
    }

    /// Inches for `attr`, or `None` after reporting why not.
    fn dimension(&mut self, element: &Element, attr: &str) -> Option<f64> {
        let Some(raw) = element.attr(attr) else {
            self.out.at(Code::SizeMissing, element.line, format!("<svg> has no {}", attr));
            return None;
        };
        match parse_length(raw) {
            Length::Inches(value) => Some(value),
            Length::Pixels(_) => {
                self.out.at(
                    Code::SizeInPixels,
                    element.line,
                    format!("{} '{}' is in pixels, the size will depend on the renderer", attr, raw),
                );
                None
            }
            Length::Unknown(unit) => {
                self.out.at(
                    Code::UnknownUnits,
                    element.line,
                    format!("{} '{}' has unknown units '{}'", attr, raw, unit),
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facts::ViewKind;
    use crate::graphic::test_support::run_standalone;

    #[test]
    fn test_parse_length_units() {
        assert_eq!(parse_length("0.5in"), Length::Inches(0.5));
        assert_eq!(parse_length("25.4mm"), Length::Inches(1.0));
        assert_eq!(parse_length(" 2.54cm "), Length::Inches(1.0));
        assert_eq!(parse_length("72"), Length::Pixels(72.0));
        assert_eq!(parse_length("72px"), Length::Pixels(72.0));
        assert_eq!(parse_length("3pt"), Length::Unknown("pt".to_string()));
        assert_eq!(parse_length("wide"), Length::Unknown("wide".to_string()));
    }

    #[test]
    fn test_parse_view_box() {
        assert_eq!(parse_view_box("0 0 100 200"), Some([0.0, 0.0, 100.0, 200.0]));
        assert_eq!(parse_view_box("0,0, 100,200"), Some([0.0, 0.0, 100.0, 200.0]));
        assert_eq!(parse_view_box("0 0 100"), None);
        assert_eq!(parse_view_box("0 0 -1 2"), None);
    }

    #[test]
    fn test_scale_and_origin() {
        let (sink, _) = run_standalone(
            r#"<svg width="0.1in" height="0.2in" viewBox="1 0 100 200"><g id="breadboard"/></svg>"#,
            Some(ViewKind::Breadboard),
        );
        assert!(sink.has(Code::ViewBoxOrigin));
        assert!(!sink.has(Code::ScaleMismatch));

        let (sink, _) = run_standalone(
            r#"<svg width="0.1in" height="0.2in" viewBox="0 0 10 20"><g id="breadboard"/></svg>"#,
            Some(ViewKind::Breadboard),
        );
        assert_eq!(sink.count(Code::ScaleMismatch), 1);
    }

    #[test]
    fn test_root_must_be_svg() {
        let (sink, _) = run_standalone(r#"<html><svg/></html>"#, None);
        assert!(sink.has(Code::RootNotSvg));
        assert!(sink.has(Code::SvgRootRepeated));
    }

    #[test]
    fn test_pixel_and_missing_sizes() {
        let (sink, _) = run_standalone(r#"<svg width="100px" viewBox="0 0 1 1"/>"#, None);
        assert!(sink.has(Code::SizeInPixels));
        assert!(sink.has(Code::SizeMissing));
        assert!(!sink.has(Code::ScaleMismatch));
    }
}
