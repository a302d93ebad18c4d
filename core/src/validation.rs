use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// A borrowed view of one form field, as seen by validation rules.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue<'a> {
    Text(&'a str),
    Number(f64),
    Flag(bool),
}

type CustomCheck = dyn Fn(&FieldValue<'_>) -> Result<(), String> + Send + Sync;

#[derive(Clone)]
pub enum Rule {
    /// Non-empty after trimming.
    RequiredString,
    /// Inclusive numeric bounds.
    NumericRange { min: f64, max: f64 },
    /// Text must equal one of the listed choices.
    OneOf(Vec<String>),
    /// `HH:MM`, 24-hour clock.
    ClockTime,
    Custom(Arc<CustomCheck>),
}

impl Rule {
    pub fn range(min: f64, max: f64) -> Self {
        Rule::NumericRange { min, max }
    }

    pub fn at_least(min: f64) -> Self {
        Rule::NumericRange {
            min,
            max: f64::INFINITY,
        }
    }

    pub fn one_of<I, S>(choices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Rule::OneOf(choices.into_iter().map(Into::into).collect())
    }

    pub fn custom(
        check: impl Fn(&FieldValue<'_>) -> Result<(), String> + Send + Sync + 'static,
    ) -> Self {
        Rule::Custom(Arc::new(check))
    }

    pub fn check(&self, value: &FieldValue<'_>) -> Result<(), String> {
        match (self, value) {
            (Rule::RequiredString, FieldValue::Text(text)) => {
                if text.trim().is_empty() {
                    Err("This field is required".to_string())
                } else {
                    Ok(())
                }
            }
            (Rule::NumericRange { min, max }, FieldValue::Number(number)) => {
                if number.is_nan() || number < min || number > max {
                    Err(range_message(*min, *max))
                } else {
                    Ok(())
                }
            }
            (Rule::OneOf(choices), FieldValue::Text(text)) => {
                if choices.iter().any(|choice| choice == text) {
                    Ok(())
                } else {
                    Err(format!("Must be one of: {}", choices.join(", ")))
                }
            }
            (Rule::ClockTime, FieldValue::Text(text)) => {
                if is_clock_time(text) {
                    Ok(())
                } else {
                    Err("Use HH:MM (24-hour)".to_string())
                }
            }
            (Rule::Custom(check), value) => (**check)(value),
            (rule, value) => Err(format!("{rule:?} does not apply to {value:?}")),
        }
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rule::RequiredString => f.write_str("RequiredString"),
            Rule::NumericRange { min, max } => f
                .debug_struct("NumericRange")
                .field("min", min)
                .field("max", max)
                .finish(),
            Rule::OneOf(choices) => f.debug_tuple("OneOf").field(choices).finish(),
            Rule::ClockTime => f.write_str("ClockTime"),
            Rule::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

fn range_message(min: f64, max: f64) -> String {
    if max.is_infinite() {
        format!("Must be at least {min}")
    } else {
        format!("Must be between {min} and {max}")
    }
}

fn is_clock_time(text: &str) -> bool {
    let Some((hours, minutes)) = text.split_once(':') else {
        return false;
    };
    if hours.len() != 2 || minutes.len() != 2 {
        return false;
    }
    matches!(
        (hours.parse::<u8>(), minutes.parse::<u8>()),
        (Ok(h), Ok(m)) if h < 24 && m < 60
    )
}

/// Field name to inline error message.
pub type FieldErrors = BTreeMap<&'static str, String>;

/// Anything a [`ValidationPolicy`] can inspect field by field.
pub trait Validate {
    fn field(&self, name: &str) -> Option<FieldValue<'_>>;
}

#[derive(Debug, Clone, Default)]
pub struct ValidationPolicy {
    rules: Vec<(&'static str, Rule)>,
}

impl ValidationPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rule(mut self, field: &'static str, rule: Rule) -> Self {
        self.rules.push((field, rule));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Runs every rule; the first failure per field is kept.
    pub fn validate(&self, record: &impl Validate) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        for (field, rule) in &self.rules {
            let field = *field;
            if errors.contains_key(field) {
                continue;
            }
            let outcome = match record.field(field) {
                Some(value) => rule.check(&value),
                None => Err(format!("Unknown field '{field}'")),
            };
            if let Err(message) = outcome {
                errors.insert(field, message);
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Sample {
        name: String,
        share: f64,
        cadence: String,
    }

    impl Validate for Sample {
        fn field(&self, name: &str) -> Option<FieldValue<'_>> {
            match name {
                "name" => Some(FieldValue::Text(&self.name)),
                "share" => Some(FieldValue::Number(self.share)),
                "cadence" => Some(FieldValue::Text(&self.cadence)),
                _ => None,
            }
        }
    }

    fn policy() -> ValidationPolicy {
        ValidationPolicy::new()
            .rule("name", Rule::RequiredString)
            .rule("share", Rule::range(0.0, 100.0))
            .rule("cadence", Rule::one_of(["daily", "weekly"]))
    }

    #[test]
    fn valid_record_passes() {
        let sample = Sample {
            name: "Ana".to_string(),
            share: 100.0,
            cadence: "weekly".to_string(),
        };
        assert!(policy().validate(&sample).is_ok());
    }

    #[test]
    fn every_failing_field_is_reported() {
        let sample = Sample {
            name: "   ".to_string(),
            share: 100.5,
            cadence: "hourly".to_string(),
        };
        let errors = policy().validate(&sample).expect_err("invalid sample");
        assert_eq!(errors.len(), 3);
        assert_eq!(errors["share"], "Must be between 0 and 100");
    }

    #[test]
    fn unknown_field_is_an_error() {
        let sample = Sample {
            name: "Ana".to_string(),
            share: 1.0,
            cadence: "daily".to_string(),
        };
        let errors = ValidationPolicy::new()
            .rule("missing", Rule::RequiredString)
            .validate(&sample)
            .expect_err("unknown field");
        assert!(errors.contains_key("missing"));
    }

    #[test]
    fn clock_time_rule_checks_bounds() {
        assert!(Rule::ClockTime.check(&FieldValue::Text("23:59")).is_ok());
        assert!(Rule::ClockTime.check(&FieldValue::Text("24:00")).is_err());
        assert!(Rule::ClockTime.check(&FieldValue::Text("9:00")).is_err());
    }

    #[test]
    fn custom_rule_is_pluggable() {
        let even = Rule::custom(|value| match value {
            FieldValue::Number(number) if number % 2.0 == 0.0 => Ok(()),
            _ => Err("Must be even".to_string()),
        });
        assert!(even.check(&FieldValue::Number(4.0)).is_ok());
        assert!(even.check(&FieldValue::Number(3.0)).is_err());
    }
}
