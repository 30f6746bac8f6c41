//! Primality classification.
//!
//! `precheck` settles every input that needs no trial division; whatever it
//! leaves over is odd and at least 3, which is the domain `is_prime` is tuned
//! for.

/// Outcome of a primality check. Doubles as the counter tag value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verdict {
    NotNatural,
    One,
    Even,
    Prime,
    NotPrime,
}

impl Verdict {
    pub fn tag_value(self) -> &'static str {
        match self {
            Verdict::NotNatural => "not-natural",
            Verdict::One => "one",
            Verdict::Even => "even",
            Verdict::Prime => "prime",
            Verdict::NotPrime => "not-prime",
        }
    }

    /// Human readable answer for `number`.
    pub fn message(self, number: i64) -> String {
        match self {
            Verdict::NotNatural => "Only natural numbers can be prime numbers.".to_string(),
            Verdict::Prime => format!("{number} is prime."),
            Verdict::One | Verdict::Even | Verdict::NotPrime => format!("{number} is not prime."),
        }
    }
}

/// Classify without trial division. `None` means `number` is odd and >= 3.
pub fn precheck(number: i64) -> Option<Verdict> {
    if number < 1 {
        return Some(Verdict::NotNatural);
    }
    if number == 1 {
        return Some(Verdict::One);
    }
    if number == 2 || number % 2 == 0 {
        return Some(Verdict::Even);
    }
    None
}

/// Full classification, trial division included.
pub fn classify(number: i64) -> Verdict {
    precheck(number).unwrap_or_else(|| {
        if is_prime(number) {
            Verdict::Prime
        } else {
            Verdict::NotPrime
        }
    })
}

/// Trial division by every odd `d` with `3 <= d <= floor(sqrt(n))`.
///
/// Callers normally pass odd `n >= 3`; other inputs get the mathematical
/// answer.
pub fn is_prime(n: i64) -> bool {
    if n < 2 {
        return false;
    }
    if n % 2 == 0 {
        return n == 2;
    }
    // `d <= n / d` is `d * d <= n` without the overflow near i64::MAX.
    let mut d: i64 = 3;
    while d <= n / d {
        if n % d == 0 {
            return false;
        }
        d += 2;
    }
    true
}
