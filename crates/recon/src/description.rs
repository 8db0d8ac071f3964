//! Decomposition of local tax descriptions such as `"$5.00 / month"`,
//! `"1.50%"` or `"2% + $10 a year"` into [`TaxComponents`].

use reregion_core::TaxComponents;

use crate::diagnostics::{Anomaly, Diagnostics};

/// Pattern classes, in the order they are tried. The first match wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptionClass {
    /// Contains `-`: a range such as `1-2%`. Nothing is extracted.
    Range,
    /// `$<fee> / month`.
    Monthly,
    /// `<rate>% + $<fee> …`: sets `rate` and `yearly_fee`. Tried before
    /// `Yearly` so `"2% + $10 a year"` keeps its rate.
    RatePlusFee,
    /// `$<fee> a year`.
    Yearly,
    /// `$<fee> per pay period`.
    PayPeriod,
    /// `<pct>% of state liability` / `<pct>% of state tax`.
    StateLiability,
    /// `<rate>% (no LST …)`.
    NoLst,
    /// Bare percentage.
    Rate,
    Unrecognized,
}

pub fn classify(text: &str) -> DescriptionClass {
    use DescriptionClass::*;

    if text.contains('-') {
        Range
    } else if text.contains("month") {
        Monthly
    } else if text.contains('+') {
        RatePlusFee
    } else if text.contains("year") {
        Yearly
    } else if text.contains("per pay period") {
        PayPeriod
    } else if text.contains("of state liability") || text.contains("of state tax") {
        StateLiability
    } else if text.contains("no LST") {
        NoLst
    } else if text.contains('%') && !text.contains("dividends") && !text.contains("to") {
        Rate
    } else {
        Unrecognized
    }
}

/// Parse one description. `raw_text` always keeps the input verbatim.
///
/// Ranges are reported to `diagnostics` and produce no fields. Unrecognized
/// formats produce no fields and no report.
pub fn parse_description(text: &str, diagnostics: &dyn Diagnostics) -> TaxComponents {
    let mut out = TaxComponents::unparsed(text);

    match classify(text) {
        DescriptionClass::Range => {
            diagnostics.report(Anomaly::UnparsableDescription { text: text.to_string() });
        }
        DescriptionClass::RatePlusFee => {
            if let Some((rate, fee)) = text.split_once('+') {
                out.rate = non_empty(strip_percent(rate));
                out.yearly_fee = fee
                    .split_whitespace()
                    .next()
                    .and_then(|tok| non_empty(strip_currency(tok)));
            }
        }
        DescriptionClass::Monthly => {
            out.monthly_fee = non_empty(strip_currency(before(text, " / ")));
        }
        DescriptionClass::Yearly => {
            out.yearly_fee = non_empty(strip_currency(before(text, " a ")));
        }
        DescriptionClass::PayPeriod => {
            out.pay_period_fee = non_empty(strip_currency(before(text, " per pay ")));
        }
        DescriptionClass::StateLiability => {
            out.percent_of_state_liability = non_empty(strip_percent(before(text, " of state ")));
        }
        DescriptionClass::NoLst => {
            out.rate = non_empty(strip_percent(before(text, " (")));
        }
        DescriptionClass::Rate => {
            out.rate = non_empty(strip_percent(text));
        }
        DescriptionClass::Unrecognized => {}
    }

    out
}

fn before<'a>(text: &'a str, delimiter: &str) -> &'a str {
    text.split(delimiter).next().unwrap_or(text).trim()
}

fn strip_currency(s: &str) -> &str {
    let s = s.trim();
    s.strip_prefix('$').unwrap_or(s)
}

fn strip_percent(s: &str) -> &str {
    let s = s.trim();
    s.strip_suffix('%').unwrap_or(s).trim_end()
}

fn non_empty(s: &str) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::CollectingDiagnostics;

    fn parse(text: &str) -> TaxComponents {
        parse_description(text, &CollectingDiagnostics::new())
    }

    #[test]
    fn monthly_fee() {
        let c = parse("$5.00 / month");
        assert_eq!(c.monthly_fee.as_deref(), Some("5.00"));
        assert_eq!(c.rate, None);
        assert_eq!(c.yearly_fee, None);
    }

    #[test]
    fn yearly_fee() {
        let c = parse("$10 a year");
        assert_eq!(c.yearly_fee.as_deref(), Some("10"));
        assert_eq!(c.monthly_fee, None);
    }

    #[test]
    fn pay_period_fee() {
        let c = parse("$1.50 per pay period");
        assert_eq!(c.pay_period_fee.as_deref(), Some("1.50"));
    }

    #[test]
    fn percent_of_state_liability() {
        assert_eq!(
            parse("25% of state liability").percent_of_state_liability.as_deref(),
            Some("25")
        );
        assert_eq!(parse("8.5% of state tax").percent_of_state_liability.as_deref(), Some("8.5"));
    }

    #[test]
    fn rate_plus_fee_sets_rate_and_yearly_fee() {
        let c = parse("2% + $10 a year");
        assert_eq!(c.rate.as_deref(), Some("2"));
        assert_eq!(c.yearly_fee.as_deref(), Some("10"));
        assert_eq!(c.monthly_fee, None);

        let c = parse("1% + $52");
        assert_eq!(c.rate.as_deref(), Some("1"));
        assert_eq!(c.yearly_fee.as_deref(), Some("52"));
    }

    #[test]
    fn plus_sits_between_month_and_year() {
        assert_eq!(classify("1% + $2 / month"), DescriptionClass::Monthly);
        assert_eq!(classify("2% + $10 a year"), DescriptionClass::RatePlusFee);
        assert_eq!(classify("1% + $3 per pay period"), DescriptionClass::RatePlusFee);

        let c = parse("1% + $2 / month");
        assert_eq!(c.monthly_fee.as_deref(), Some("1% + $2"));
        assert_eq!(c.rate, None);
    }

    #[test]
    fn no_lst_rate() {
        assert_eq!(parse("1.5% (no LST)").rate.as_deref(), Some("1.5"));
    }

    #[test]
    fn bare_rate() {
        let c = parse("1.50%");
        assert_eq!(c.rate.as_deref(), Some("1.50"));
        assert_eq!(c.raw_text, "1.50%");
        assert_eq!(parse("  2.25% ").rate.as_deref(), Some("2.25"));
    }

    #[test]
    fn dividends_and_caps_are_unrecognized() {
        assert!(parse("5% on dividends").is_empty());
        assert!(parse("1% up to $50").is_empty());
        assert!(parse("Flat").is_empty());
        assert!(parse("").is_empty());
    }

    #[test]
    fn range_warns_and_extracts_nothing() {
        let d = CollectingDiagnostics::new();
        let c = parse_description("1-2%", &d);
        assert!(c.is_empty());
        assert_eq!(c.raw_text, "1-2%");
        assert_eq!(d.unparsable(), vec!["1-2%".to_string()]);
    }

    #[test]
    fn unrecognized_does_not_warn() {
        let d = CollectingDiagnostics::new();
        parse_description("varies", &d);
        assert!(d.events().is_empty());
    }

    #[test]
    fn range_wins_over_every_other_class() {
        assert_eq!(classify("$1-$2 / month"), DescriptionClass::Range);
        assert_eq!(classify("1% + $2-3"), DescriptionClass::Range);
    }
}
