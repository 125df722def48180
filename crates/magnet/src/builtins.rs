/// Built-in intrinsic names.
///
/// This module provides the static list of intrinsics shipped with the language
/// runtime. A user-level `function`/`procedure` that reuses one of these names
/// shadows the intrinsic, which the scanner reports as a warning.

use std::collections::HashSet;
use std::sync::OnceLock;

/// Intrinsics commonly redefined by accident. Names are case-sensitive.
pub const INTRINSIC_NAMES: &[&str] = &[
    "Abs",
    "Append",
    "Arccos",
    "Arcsin",
    "Arctan",
    "Basis",
    "BaseRing",
    "Binomial",
    "Ceiling",
    "ChangeRing",
    "CharacteristicPolynomial",
    "Coefficient",
    "Coefficients",
    "Cos",
    "Degree",
    "Denominator",
    "Determinant",
    "Dimension",
    "Discriminant",
    "Divisors",
    "Eltseq",
    "Evaluate",
    "Exclude",
    "Exp",
    "Factorial",
    "Factorization",
    "FiniteField",
    "Floor",
    "GCD",
    "Gcd",
    "Generators",
    "Identity",
    "Image",
    "Include",
    "Index",
    "Insert",
    "IntegerRing",
    "Integers",
    "IsDefined",
    "IsDivisibleBy",
    "IsEmpty",
    "IsEven",
    "IsIrreducible",
    "IsOdd",
    "IsOne",
    "IsPrime",
    "IsSquare",
    "IsZero",
    "Kernel",
    "LCM",
    "Lcm",
    "LeadingCoefficient",
    "Log",
    "Matrix",
    "Max",
    "Min",
    "Modexp",
    "Ncols",
    "NextPrime",
    "Norm",
    "Nrows",
    "Numerator",
    "One",
    "Order",
    "Parent",
    "PolynomialRing",
    "Position",
    "PreviousPrime",
    "PrimeDivisors",
    "Print",
    "Prune",
    "Random",
    "Rank",
    "RationalField",
    "Rationals",
    "RealField",
    "Remove",
    "Reverse",
    "Roots",
    "Round",
    "Seqset",
    "Setseq",
    "Sign",
    "Sin",
    "Sort",
    "Sqrt",
    "Submatrix",
    "Sum",
    "Tan",
    "Trace",
    "Transpose",
    "Type",
    "Valuation",
    "Vector",
    "VectorSpace",
    "Zero",
    "assert",
    "error",
    "printf",
    "sprintf",
];

fn intrinsic_set() -> &'static HashSet<&'static str> {
    static SET: OnceLock<HashSet<&'static str>> = OnceLock::new();
    SET.get_or_init(|| INTRINSIC_NAMES.iter().copied().collect())
}

/// Check if a name is a built-in intrinsic.
///
/// ```
/// use magnet::builtins::is_intrinsic;
///
/// assert!(is_intrinsic("Factorial"));
/// assert!(!is_intrinsic("factorial"));
/// ```
pub fn is_intrinsic(name: &str) -> bool {
    intrinsic_set().contains(name)
}
