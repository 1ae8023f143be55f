//! Naming conventions applied to record member names.
//!
//! Conventions only ever see record member names (or their aliases);
//! dictionary keys are data and are written as they are.

use heck::{ToKebabCase, ToLowerCamelCase, ToSnakeCase, ToUpperCamelCase};

pub trait NamingConvention {
    fn apply(&self, name: &str) -> String;
}

impl<F> NamingConvention for F
where
    F: Fn(&str) -> String,
{
    fn apply(&self, name: &str) -> String {
        self(name)
    }
}

/// Leaves names unchanged.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullNamingConvention;

impl NamingConvention for NullNamingConvention {
    fn apply(&self, name: &str) -> String {
        name.to_owned()
    }
}

/// `first_name` / `FirstName` become `firstName`.
#[derive(Clone, Copy, Debug, Default)]
pub struct CamelCaseNamingConvention;

impl NamingConvention for CamelCaseNamingConvention {
    fn apply(&self, name: &str) -> String {
        name.to_lower_camel_case()
    }
}

/// `first_name` / `firstName` become `FirstName`.
#[derive(Clone, Copy, Debug, Default)]
pub struct PascalCaseNamingConvention;

impl NamingConvention for PascalCaseNamingConvention {
    fn apply(&self, name: &str) -> String {
        name.to_upper_camel_case()
    }
}

/// `FirstName` becomes `first_name`.
#[derive(Clone, Copy, Debug, Default)]
pub struct UnderscoredNamingConvention;

impl NamingConvention for UnderscoredNamingConvention {
    fn apply(&self, name: &str) -> String {
        name.to_snake_case()
    }
}

/// `FirstName` becomes `first-name`.
#[derive(Clone, Copy, Debug, Default)]
pub struct HyphenatedNamingConvention;

impl NamingConvention for HyphenatedNamingConvention {
    fn apply(&self, name: &str) -> String {
        name.to_kebab_case()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conventions() {
        assert_eq!(CamelCaseNamingConvention.apply("FirstTest"), "firstTest");
        assert_eq!(CamelCaseNamingConvention.apply("first_test"), "firstTest");
        assert_eq!(PascalCaseNamingConvention.apply("secondTest"), "SecondTest");
        assert_eq!(UnderscoredNamingConvention.apply("ThirdTest"), "third_test");
        assert_eq!(HyphenatedNamingConvention.apply("FourthTest"), "fourth-test");
        assert_eq!(NullNamingConvention.apply("As_Is"), "As_Is");
    }

    #[test]
    fn closures_are_conventions() {
        let upper = |name: &str| name.to_uppercase();
        assert_eq!(upper.apply("abc"), "ABC");
    }
}
