use core::fmt;
use core::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use cook_core::{DomainError, DomainResult, ValueObject};

/// Strictly positive product price with at most two decimal places.
///
/// The bounds match the `NUMERIC(10, 2)` price column, so every `Price` is stored
/// exactly as built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Price(Decimal);

impl Price {
    pub const MAX_SCALE: u32 = 2;

    /// 99,999,999.99
    pub const MAX: Decimal = Decimal::from_parts(1_410_065_407, 2, 0, false, 2);

    pub fn new(value: Decimal) -> DomainResult<Self> {
        if value <= Decimal::ZERO {
            return Err(DomainError::validation("price", value.to_string(), "a value > 0"));
        }
        if value.normalize().scale() > Self::MAX_SCALE {
            return Err(DomainError::validation(
                "price",
                value.to_string(),
                "at most 2 decimal places",
            ));
        }
        if value > Self::MAX {
            return Err(DomainError::validation(
                "price",
                value.to_string(),
                "a value <= 99999999.99",
            ));
        }
        Ok(Self(value))
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Price {
    type Error = DomainError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl ValueObject for Price {}

/// Generates a closed token enum with `as_str`, `FromStr` and serde as the token.
macro_rules! token_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $kind:literal { $($variant:ident => $token:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $token)]
                $variant,
            )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $token,)+
                }
            }

            fn expected() -> String {
                let tokens: Vec<&str> = Self::ALL.iter().map(|v| v.as_str()).collect();
                format!("one of {}", tokens.join(", "))
            }
        }

        impl FromStr for $name {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($token => Ok($name::$variant),)+
                    other => Err(DomainError::validation($kind, other, Self::expected())),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl ValueObject for $name {}
    };
}

token_enum! {
    /// Menu section a product is listed under.
    Category, "category" {
        MainCourse => "MAIN_COURSE",
        SideDish => "SIDE_DISH",
        Drink => "DRINK",
        Dessert => "DESSERT",
    }
}

token_enum! {
    /// Whether the product can still be ordered. There is no way back from `Inactive`.
    ProductStatus, "product status" {
        Active => "ACTIVE",
        Inactive => "INACTIVE",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn price_rejects_zero_and_negative() {
        assert!(Price::new(Decimal::ZERO).is_err());
        let err = Price::new(Decimal::new(-150, 2)).unwrap_err();
        match err {
            DomainError::Validation { kind, value, .. } => {
                assert_eq!(kind, "price");
                assert_eq!(value, "-1.50");
            }
            other => panic!("expected Validation, got {other:?}"),
        }
    }

    #[test]
    fn price_beyond_cents_is_rejected() {
        let err = Price::new(Decimal::new(1, 3)).unwrap_err();
        assert!(matches!(err, DomainError::Validation { kind: "price", .. }));
        assert!(Price::new(Decimal::new(12_345, 3)).is_err());
        // trailing zeros do not count
        assert!(Price::new(Decimal::new(12_500, 3)).is_ok());
    }

    #[test]
    fn price_is_capped_at_the_column_limit() {
        assert_eq!(Price::MAX, Decimal::new(9_999_999_999, 2));
        assert!(Price::new(Price::MAX).is_ok());
        assert!(Price::new(Decimal::new(10_000_000_000, 2)).is_err());
    }

    #[test]
    fn price_equality_is_by_value() {
        let a = Price::new(Decimal::new(1250, 2)).unwrap();
        let b = Price::new(Decimal::new(125, 1)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn unknown_category_lists_allowed_tokens() {
        let err = "SOUP".parse::<Category>().unwrap_err();
        match err {
            DomainError::Validation { value, expected, .. } => {
                assert_eq!(value, "SOUP");
                assert_eq!(expected, "one of MAIN_COURSE, SIDE_DISH, DRINK, DESSERT");
            }
            other => panic!("expected Validation, got {other:?}"),
        }
    }

    #[test]
    fn tokens_are_case_sensitive() {
        assert!("drink".parse::<Category>().is_err());
        assert!("active".parse::<ProductStatus>().is_err());
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 500,
                ..ProptestConfig::default()
            })]

            /// Property: any positive amount is a price and value() returns it unchanged.
            #[test]
            fn positive_prices_round_trip(cents in 1i64..10_000_000) {
                let amount = Decimal::new(cents, 2);
                let price = Price::new(amount).unwrap();
                prop_assert_eq!(price.value(), amount);
            }

            /// Property: zero and negative amounts never produce a price.
            #[test]
            fn non_positive_prices_fail(cents in -10_000_000i64..=0) {
                prop_assert!(Price::new(Decimal::new(cents, 2)).is_err());
            }

            /// Property: every declared token parses back to itself.
            #[test]
            fn category_tokens_round_trip(idx in 0usize..4) {
                let category = Category::ALL[idx];
                prop_assert_eq!(category.as_str().parse::<Category>().unwrap(), category);
            }

            /// Property: anything outside the declared set is rejected.
            #[test]
            fn unknown_status_tokens_fail(raw in "[A-Za-z_]{1,12}") {
                prop_assume!(raw != "ACTIVE" && raw != "INACTIVE");
                prop_assert!(raw.parse::<ProductStatus>().is_err());
            }
        }
    }
}
