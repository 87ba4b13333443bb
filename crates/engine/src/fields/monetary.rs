//! Amounts in a currency: rounded to the currency, grouped per language and
//! decorated with the currency symbol.

use super::{ConvertError, FieldContext, FieldConverter, option_int};
use qweb_expr::{Map, Value};
use quick_xml::escape::escape;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

const NBSP: char = '\u{a0}';

/// Currency settings read from the `display_currency` option.
#[derive(Debug, Clone, PartialEq)]
pub struct Currency {
    pub symbol: String,
    pub position_after: bool,
    pub rounding: Decimal,
    pub decimal_places: u32,
}

impl Default for Currency {
    fn default() -> Self {
        Self {
            symbol: String::new(),
            position_after: true,
            rounding: Decimal::new(1, 2),
            decimal_places: 2,
        }
    }
}

impl Currency {
    /// Reads a currency from a mapping or record with `symbol`, `position`,
    /// `rounding` and `decimal_places`.
    pub fn from_value(value: &Value) -> Result<Self, ConvertError> {
        let get = |key: &str| -> Option<Value> {
            match value {
                Value::Map(map) => map.get(key).cloned(),
                Value::Record(record) => record.get(key),
                _ => None,
            }
        };
        if !matches!(value, Value::Map(_) | Value::Record(_)) {
            return Err(ConvertError::invalid_option(
                "display_currency",
                format!("expected a currency, got {}", value.type_name()),
            ));
        }
        let mut currency = Currency::default();
        if let Some(symbol) = get("symbol") {
            currency.symbol = symbol.to_text();
        }
        if let Some(position) = get("position") {
            currency.position_after = position.to_text() != "before";
        }
        if let Some(rounding) = get("rounding").and_then(|r| r.as_float())
            && rounding > 0.0
        {
            currency.rounding = Decimal::from_f64(rounding).ok_or_else(|| {
                ConvertError::invalid_option("display_currency", "rounding out of range")
            })?;
            currency.decimal_places = currency.rounding.normalize().scale();
        }
        if let Some(places) = get("decimal_places").and_then(|p| p.as_int()) {
            currency.decimal_places = places.clamp(0, 28) as u32;
        }
        Ok(currency)
    }

    /// `amount` rounded half away from zero to a multiple of `rounding`.
    pub fn round(&self, amount: Decimal) -> Decimal {
        if self.rounding.is_zero() {
            return amount;
        }
        (amount / self.rounding)
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            * self.rounding
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MonetaryConverter;

impl MonetaryConverter {
    fn amount(value: &Value, options: &Map) -> Result<Option<Decimal>, ConvertError> {
        let amount = match value {
            Value::None | Value::Bool(false) => return Ok(None),
            Value::Int(n) => Decimal::from(*n),
            Value::Float(f) => Decimal::from_f64(*f)
                .ok_or_else(|| ConvertError::invalid_value("monetary", value, "out of range"))?,
            other => return Err(ConvertError::invalid_value("monetary", other, "not a number")),
        };
        if options.contains_key("from_currency")
            && let Some(rate) = options.get("rate").and_then(Value::as_float)
        {
            let rate = Decimal::from_f64(rate)
                .ok_or_else(|| ConvertError::invalid_option("rate", "out of range"))?;
            return Ok(Some(amount * rate));
        }
        Ok(Some(amount))
    }
}

impl FieldConverter for MonetaryConverter {
    fn value_to_html(
        &self,
        value: &Value,
        options: &Map,
        ctx: &FieldContext,
    ) -> Result<Option<String>, ConvertError> {
        let Some(amount) = Self::amount(value, options)? else {
            return Ok(None);
        };
        let currency = match options.get("display_currency") {
            None | Some(Value::None) | Some(Value::Bool(false)) => Currency::default(),
            Some(currency) => Currency::from_value(currency)?,
        };
        let places = match option_int(options, "decimal_places")? {
            Some(places) => places.clamp(0, 28) as u32,
            None => currency.decimal_places,
        };
        let rounded = currency
            .round(amount)
            .round_dp_with_strategy(places, RoundingStrategy::MidpointAwayFromZero);
        let negative = rounded.is_sign_negative() && !rounded.is_zero();
        let unsigned = format!("{:.*}", places as usize, rounded.abs());
        let formatted = ctx
            .lang
            .format_decimal_str(&unsigned, negative)
            .replace(' ', &NBSP.to_string());

        let amount_html = format!(r#"<span class="oe_currency_value">{}</span>"#, formatted);
        let symbol = escape(currency.symbol.as_str());
        let html = if symbol.is_empty() {
            amount_html
        } else if currency.position_after {
            format!("{}{}{}", amount_html, NBSP, symbol)
        } else {
            format!("{}{}{}", symbol, NBSP, amount_html)
        };
        Ok(Some(html))
    }
}
