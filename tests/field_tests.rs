mod common;

use common::{TestResult, init_logger, store_with};
use qweb::{LangFormat, MapRecord, QWeb, RenderOptions, TemplateRef, Value, Values};

const INVOICE: &str = r#"<div><span t-field="doc.partner_id"/>: <span t-field="doc.amount_total" t-options="{'widget': 'monetary', 'display_currency': doc.currency_id}"/> (<span t-field="doc.quantity"/> items, due <span t-field="doc.date_due"/>)</div>"#;

fn german() -> LangFormat {
    LangFormat {
        code: "de_DE".into(),
        decimal_point: ",".into(),
        thousands_sep: ".".into(),
        date_format: "%d.%m.%Y".into(),
        ..LangFormat::default()
    }
}

fn invoice(amount: f64, currency: Value) -> Values {
    let partner = MapRecord::new("res.partner", Some(9))
        .with_field("display_name", "char", "Azure & Co")
        .into_value();
    let doc = MapRecord::new("account.move", Some(1))
        .with_field("partner_id", "many2one", partner)
        .with_field("amount_total", "monetary", amount)
        .with_field("currency_id", "many2one", currency)
        .with_field("quantity", "integer", 1250i64)
        .with_field("date_due", "date", "2024-03-09")
        .into_value();
    let mut values = Values::new();
    values.set("doc", doc);
    values
}

fn euro() -> Value {
    MapRecord::new("res.currency", Some(1))
        .with_field("symbol", "char", "€")
        .with_field("position", "selection", "after")
        .with_field("rounding", "float", 0.01)
        .into_value()
}

fn swiss_franc() -> Value {
    MapRecord::new("res.currency", Some(2))
        .with_field("symbol", "char", "CHF")
        .with_field("position", "selection", "before")
        .with_field("rounding", "float", 0.05)
        .into_value()
}

fn engine() -> QWeb {
    QWeb::builder(store_with(&[("invoice", INVOICE)]))
        .with_lang(german())
        .build()
}

#[test]
fn test_monetary_symbol_after_with_language_grouping() -> TestResult {
    init_logger();
    let html = engine().render(
        &TemplateRef::from("invoice"),
        invoice(1234567.891, euro()),
        &RenderOptions::default().with_lang("de_DE"),
    )?;
    assert_eq!(
        html,
        "<div><span>Azure &amp; Co</span>: <span><span class=\"oe_currency_value\">1.234.567,89</span>\u{a0}€</span> (<span>1.250</span> items, due <span>09.03.2024</span>)</div>"
    );
    Ok(())
}

#[test]
fn test_monetary_rounds_to_currency_and_puts_symbol_before() -> TestResult {
    init_logger();
    let html = engine().render(
        &TemplateRef::from("invoice"),
        invoice(1234.43, swiss_franc()),
        &RenderOptions::default(),
    )?;
    assert!(
        html.contains("<span>CHF\u{a0}<span class=\"oe_currency_value\">1,234.45</span></span>"),
        "{}",
        html
    );
    assert!(html.contains("due <span>03/09/2024</span>"));
    Ok(())
}

#[test]
fn test_monetary_space_separator_becomes_nbsp() -> TestResult {
    init_logger();
    let engine = QWeb::builder(store_with(&[("invoice", INVOICE)]))
        .with_lang(LangFormat {
            code: "fr_FR".into(),
            decimal_point: ",".into(),
            thousands_sep: " ".into(),
            ..LangFormat::default()
        })
        .build();
    let html = engine.render(
        &TemplateRef::from("invoice"),
        invoice(9876.5, euro()),
        &RenderOptions::default().with_lang("fr_FR"),
    )?;
    assert!(
        html.contains("<span class=\"oe_currency_value\">9\u{a0}876,50</span>\u{a0}€"),
        "{}",
        html
    );
    Ok(())
}

#[test]
fn test_custom_converter_registration() -> TestResult {
    init_logger();

    #[derive(Debug)]
    struct Shout;

    impl qweb::FieldConverter for Shout {
        fn value_to_html(
            &self,
            value: &Value,
            _options: &qweb::Map,
            _ctx: &qweb::FieldContext,
        ) -> Result<Option<String>, qweb::ConvertError> {
            Ok(Some(value.to_text().to_uppercase()))
        }
    }

    let mut engine = QWeb::new(store_with(&[(
        "t",
        r#"<b t-esc="word" t-options="{'widget': 'shout'}"/>"#,
    )]));
    engine.register_converter("shout", Shout);
    let mut values = Values::new();
    values.set("word", "hey");
    assert_eq!(
        engine.render(&TemplateRef::from("t"), values, &RenderOptions::default())?,
        "<b>HEY</b>"
    );
    Ok(())
}
