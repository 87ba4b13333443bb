use super::{ConvertError, FieldContext, FieldConverter, option_int, option_str};
use qweb_expr::{Map, Value};
use quick_xml::escape::escape;

const BARCODE_URL: &str = "/report/barcode/";

/// An `<img>` pointing at the barcode endpoint. Options: `symbology`
/// (default `Code128`), `width`, `height` and `img_alt`.
#[derive(Debug, Clone, Copy, Default)]
pub struct BarcodeConverter;

impl FieldConverter for BarcodeConverter {
    fn value_to_html(
        &self,
        value: &Value,
        options: &Map,
        _ctx: &FieldContext,
    ) -> Result<Option<String>, ConvertError> {
        if value.is_none_or_false() {
            return Ok(None);
        }
        let symbology = option_str(options, "symbology").unwrap_or("Code128");
        let width = option_int(options, "width")?.unwrap_or(600);
        let height = option_int(options, "height")?.unwrap_or(100);
        if width <= 0 || height <= 0 {
            return Err(ConvertError::invalid_option(
                "width",
                "barcode dimensions must be positive",
            ));
        }
        let text = value.to_text();
        let src = format!(
            "{}?barcode_type={}&value={}&width={}&height={}",
            BARCODE_URL, symbology, text, width, height
        );
        let alt = option_str(options, "img_alt").map_or_else(
            || format!("Barcode {}", text),
            str::to_string,
        );
        Ok(Some(format!(
            r#"<img src="{}" alt="{}"/>"#,
            escape(src.as_str()),
            escape(alt.as_str())
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LangFormat;

    #[test]
    fn test_barcode_image() {
        let lang = LangFormat::default();
        let ctx = FieldContext {
            lang: &lang,
            inherit_branding: false,
            translatable: false,
            expression: "o.ref",
            field_type: "barcode",
        };
        let mut options = Map::new();
        options.insert("symbology".into(), Value::str("EAN13"));
        options.insert("height".into(), Value::Int(50));
        let html = BarcodeConverter
            .value_to_html(&Value::str("A&B"), &options, &ctx)
            .unwrap();
        assert_eq!(
            html.as_deref(),
            Some(
                r#"<img src="/report/barcode/?barcode_type=EAN13&amp;value=A&amp;B&amp;width=600&amp;height=50" alt="Barcode A&amp;B"/>"#
            )
        );
    }
}
