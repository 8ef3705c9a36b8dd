use std::sync::OnceLock;

use regex::Regex;

use crate::logging;

/// BASE/QUOTE with an optional :SETTLE suffix, e.g. BTC/USDT or BTC/USDT:USDT.
static SYMBOL_RE: OnceLock<Regex> = OnceLock::new();

fn symbol_re() -> &'static Regex {
    SYMBOL_RE.get_or_init(|| {
        Regex::new(r"^[A-Z]{2,10}/[A-Z]{2,10}(:[A-Z]{2,10})?$").expect("symbol pattern")
    })
}

#[derive(Clone, Copy, Debug)]
pub struct Bounds {
    pub min: f64,
    pub max: f64,
}

#[derive(Clone, Copy, Debug)]
pub struct ValidationRules {
    pub quantity: Bounds,
    pub price: Bounds,
    pub leverage: (i64, i64),
    pub spread: Bounds,
}

impl Default for ValidationRules {
    fn default() -> Self {
        Self {
            quantity: Bounds { min: 0.0001, max: 1000.0 },
            price: Bounds { min: 0.0001, max: 1_000_000.0 },
            leverage: (1, 125),
            spread: Bounds { min: 0.01, max: 10.0 },
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

#[derive(Clone, Debug, Default)]
pub struct Validation {
    pub errors: Vec<FieldError>,
}

impl Validation {
    pub fn valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn ok() -> Self {
        Self::default()
    }

    fn fail(field: &'static str, message: impl Into<String>) -> Self {
        let message = message.into();
        logging::log_validation(field, &message);
        Self {
            errors: vec![FieldError { field, message }],
        }
    }

    fn merge(&mut self, other: Validation) {
        self.errors.extend(other.errors);
    }
}

/// Order form fields as submitted; `None` means the field was not provided
/// and is skipped, mirroring partial form updates.
#[derive(Clone, Debug, Default)]
pub struct OrderParams {
    pub symbol: Option<String>,
    pub quantity: Option<String>,
    pub price: Option<String>,
    pub leverage: Option<String>,
    pub spread: Option<String>,
}

/// Checks order parameters before submission so obviously invalid orders
/// never reach the backend.
#[derive(Clone, Debug, Default)]
pub struct OrderValidator {
    rules: ValidationRules,
}

impl OrderValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn validate_symbol(&self, raw: &str) -> Validation {
        let normalized = raw.trim().to_uppercase();
        if normalized.is_empty() {
            return Validation::fail("symbol", "symbol is required");
        }
        if !symbol_re().is_match(&normalized) {
            return Validation::fail(
                "symbol",
                "invalid symbol format, expected BASE/QUOTE or BASE/QUOTE:SETTLE",
            );
        }
        Validation::ok()
    }

    pub fn validate_quantity(&self, raw: &str) -> Validation {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Validation::fail("quantity", "quantity is required");
        }
        let num: f64 = match trimmed.parse() {
            Ok(n) => n,
            Err(_) => return Validation::fail("quantity", "quantity must be a number"),
        };
        if num <= 0.0 {
            return Validation::fail("quantity", "quantity must be positive");
        }
        let Bounds { min, max } = self.rules.quantity;
        if num < min || num > max {
            return Validation::fail(
                "quantity",
                format!("quantity must be between {} and {}", min, max),
            );
        }
        Validation::ok()
    }

    pub fn validate_price(&self, raw: &str) -> Validation {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Validation::fail("price", "price is required");
        }
        let num: f64 = match trimmed.parse() {
            Ok(n) => n,
            Err(_) => return Validation::fail("price", "price must be a number"),
        };
        if num <= 0.0 {
            return Validation::fail("price", "price must be positive");
        }
        let Bounds { min, max } = self.rules.price;
        if num < min || num > max {
            return Validation::fail(
                "price",
                format!("price must be between {} and {}", min, max),
            );
        }
        Validation::ok()
    }

    pub fn validate_leverage(&self, raw: &str) -> Validation {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Validation::fail("leverage", "leverage is required");
        }
        let num: i64 = match trimmed.parse() {
            Ok(n) => n,
            Err(_) => return Validation::fail("leverage", "leverage must be an integer"),
        };
        let (min, max) = self.rules.leverage;
        if num < min || num > max {
            return Validation::fail(
                "leverage",
                format!("leverage must be between {} and {}", min, max),
            );
        }
        Validation::ok()
    }

    pub fn validate_spread(&self, raw: &str) -> Validation {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Validation::fail("spread", "spread is required");
        }
        let num: f64 = match trimmed.parse() {
            Ok(n) => n,
            Err(_) => return Validation::fail("spread", "spread must be a number"),
        };
        if num < 0.0 {
            return Validation::fail("spread", "spread must be non-negative");
        }
        let Bounds { min, max } = self.rules.spread;
        if num < min || num > max {
            return Validation::fail(
                "spread",
                format!("spread must be between {}% and {}%", min, max),
            );
        }
        Validation::ok()
    }

    /// Validates only the fields that are present; accumulates all errors.
    pub fn validate_order(&self, params: &OrderParams) -> Validation {
        let mut result = Validation::ok();
        if let Some(symbol) = &params.symbol {
            result.merge(self.validate_symbol(symbol));
        }
        if let Some(quantity) = &params.quantity {
            result.merge(self.validate_quantity(quantity));
        }
        if let Some(price) = &params.price {
            result.merge(self.validate_price(price));
        }
        if let Some(leverage) = &params.leverage {
            result.merge(self.validate_leverage(leverage));
        }
        if let Some(spread) = &params.spread {
            result.merge(self.validate_spread(spread));
        }
        result
    }
}
