//! Bivariate polynomials in `X` and `Y` with arbitrary-precision coefficients.
//!
//! [`Polynomial`] is the expanded form: a sparse map from exponent pairs to non-zero
//! [`BigUint`] coefficients. [`FactoredPolynomial`] is what the solver carries around:
//! a monomial shift `X^a·Y^b` times a list of shared factors. Products only append
//! factors. Sums pull out the common shift and common factors before expanding
//! the remainders, so the bridge and block products built during decomposition
//! stay unexpanded for as long as possible.

use num_bigint::BigUint;
use num_traits::One;
use std::collections::BTreeMap;
use std::fmt;
use std::ops::{Add, AddAssign, Mul};
use std::sync::Arc;

// ============================================================================
// Polynomial
// ============================================================================

/// Sparse polynomial in `X` and `Y`. Keys are `(x_exponent, y_exponent)`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Polynomial {
    terms: BTreeMap<(u32, u32), BigUint>,
}

impl Polynomial {
    /// The zero polynomial.
    pub fn zero() -> Self {
        Self::default()
    }

    /// The constant 1.
    pub fn one() -> Self {
        Self::monomial(0, 0)
    }

    /// `X^i·Y^j`.
    pub fn monomial(i: u32, j: u32) -> Self {
        let mut terms = BTreeMap::new();
        terms.insert((i, j), BigUint::one());
        Self { terms }
    }

    /// `Y^lo + Y^(lo+1) + … + Y^hi`; zero when `hi < lo`.
    pub fn y_range(lo: u32, hi: u32) -> Self {
        Self {
            terms: (lo..=hi).map(|t| ((0, t), BigUint::one())).collect(),
        }
    }

    /// Coefficient of `X^i·Y^j`.
    pub fn coefficient(&self, i: u32, j: u32) -> BigUint {
        self.terms.get(&(i, j)).cloned().unwrap_or_default()
    }

    /// Non-zero terms as `(i, j, coefficient)` in ascending `(i, j)` order.
    pub fn terms(&self) -> impl Iterator<Item = (u32, u32, &BigUint)> + '_ {
        self.terms.iter().map(|(&(i, j), c)| (i, j, c))
    }

    /// Number of non-zero terms.
    pub fn num_terms(&self) -> usize {
        self.terms.len()
    }

    /// Returns `true` for the zero polynomial.
    pub fn is_zero(&self) -> bool {
        self.terms.is_empty()
    }

    /// Returns `true` for the constant 1.
    pub fn is_one(&self) -> bool {
        self.terms.len() == 1 && self.terms.get(&(0, 0)).is_some_and(One::is_one)
    }

    /// Highest power of `X` (0 for the zero polynomial).
    pub fn x_degree(&self) -> u32 {
        self.terms.keys().map(|&(i, _)| i).max().unwrap_or(0)
    }

    /// Highest power of `Y` (0 for the zero polynomial).
    pub fn y_degree(&self) -> u32 {
        self.terms.keys().map(|&(_, j)| j).max().unwrap_or(0)
    }

    /// The largest monomial `(a, b)` dividing every term, or `None` for zero.
    fn min_shift(&self) -> Option<(u32, u32)> {
        let a = self.terms.keys().map(|&(i, _)| i).min()?;
        let b = self.terms.keys().map(|&(_, j)| j).min()?;
        Some((a, b))
    }

    /// Multiplies by `X^a·Y^b`.
    pub fn shifted(&self, a: u32, b: u32) -> Self {
        if a == 0 && b == 0 {
            return self.clone();
        }
        Self {
            terms: self
                .terms
                .iter()
                .map(|(&(i, j), c)| ((i + a, j + b), c.clone()))
                .collect(),
        }
    }

    /// Divides by `X^a·Y^b`. Every term must be divisible.
    fn unshifted(&self, a: u32, b: u32) -> Self {
        Self {
            terms: self
                .terms
                .iter()
                .map(|(&(i, j), c)| ((i - a, j - b), c.clone()))
                .collect(),
        }
    }
}

impl AddAssign<&Polynomial> for Polynomial {
    fn add_assign(&mut self, rhs: &Polynomial) {
        for (&key, c) in &rhs.terms {
            *self.terms.entry(key).or_default() += c;
        }
    }
}

impl Add for &Polynomial {
    type Output = Polynomial;

    fn add(self, rhs: &Polynomial) -> Polynomial {
        let mut out = self.clone();
        out += rhs;
        out
    }
}

impl Mul for &Polynomial {
    type Output = Polynomial;

    fn mul(self, rhs: &Polynomial) -> Polynomial {
        let mut terms: BTreeMap<(u32, u32), BigUint> = BTreeMap::new();
        for (&(i1, j1), c1) in &self.terms {
            for (&(i2, j2), c2) in &rhs.terms {
                *terms.entry((i1 + i2, j1 + j2)).or_default() += c1 * c2;
            }
        }
        Polynomial { terms }
    }
}

fn write_monomial(f: &mut fmt::Formatter<'_>, i: u32, j: u32) -> fmt::Result {
    let mut sep = "";
    for (name, e) in [("X", i), ("Y", j)] {
        match e {
            0 => {}
            1 => {
                write!(f, "{sep}{name}")?;
                sep = "*";
            }
            _ => {
                write!(f, "{sep}{name}^{e}")?;
                sep = "*";
            }
        }
    }
    Ok(())
}

impl fmt::Display for Polynomial {
    /// Highest `X` power first, e.g. `X^2 + 2*X*Y + Y`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_zero() {
            return f.write_str("0");
        }
        for (n, (&(i, j), c)) in self.terms.iter().rev().enumerate() {
            if n > 0 {
                f.write_str(" + ")?;
            }
            if i == 0 && j == 0 {
                write!(f, "{c}")?;
            } else {
                if !c.is_one() {
                    write!(f, "{c}*")?;
                }
                write_monomial(f, i, j)?;
            }
        }
        Ok(())
    }
}

// ============================================================================
// FactoredPolynomial
// ============================================================================

/// `X^a·Y^b · Π factors`, or zero.
///
/// Factors are shared behind [`Arc`], so cloning is cheap and cached values can be
/// handed to several threads at once. Factors never carry a monomial divisor and
/// are never the constant 1; both are folded into the shift.
#[derive(Clone, Debug)]
pub struct FactoredPolynomial {
    zero: bool,
    shift: (u32, u32),
    factors: Vec<Arc<Polynomial>>,
}

impl Default for FactoredPolynomial {
    fn default() -> Self {
        Self::one()
    }
}

impl From<Polynomial> for FactoredPolynomial {
    fn from(p: Polynomial) -> Self {
        let Some((a, b)) = p.min_shift() else {
            return Self::zero();
        };
        let rest = p.unshifted(a, b);
        let factors = if rest.is_one() {
            Vec::new()
        } else {
            vec![Arc::new(rest)]
        };
        Self {
            zero: false,
            shift: (a, b),
            factors,
        }
    }
}

impl FactoredPolynomial {
    /// The constant 0.
    pub fn zero() -> Self {
        Self {
            zero: true,
            shift: (0, 0),
            factors: Vec::new(),
        }
    }

    /// The constant 1.
    pub fn one() -> Self {
        Self::monomial(0, 0)
    }

    /// `X^i`.
    pub fn x(i: u32) -> Self {
        Self::monomial(i, 0)
    }

    /// `Y^j`.
    pub fn y(j: u32) -> Self {
        Self::monomial(0, j)
    }

    /// `X^i·Y^j`.
    pub fn monomial(i: u32, j: u32) -> Self {
        Self {
            zero: false,
            shift: (i, j),
            factors: Vec::new(),
        }
    }

    /// `Y^lo + … + Y^hi`; zero when `hi < lo`.
    pub fn y_range(lo: u32, hi: u32) -> Self {
        Polynomial::y_range(lo, hi).into()
    }

    /// Returns `true` if this is the zero polynomial.
    pub fn is_zero(&self) -> bool {
        self.zero
    }

    /// Number of non-monomial factors held.
    pub fn num_factors(&self) -> usize {
        self.factors.len()
    }

    /// Multiplies in place. Factors of `other` are shared, not copied.
    pub fn times(&mut self, other: &FactoredPolynomial) {
        if self.zero {
            return;
        }
        if other.zero {
            *self = Self::zero();
            return;
        }
        self.shift.0 += other.shift.0;
        self.shift.1 += other.shift.1;
        self.factors.extend(other.factors.iter().cloned());
    }

    /// Returns `self · other`, leaving both untouched.
    pub fn times_copy(&self, other: &FactoredPolynomial) -> FactoredPolynomial {
        let mut out = self.clone();
        out.times(other);
        out
    }

    /// Adds `other` in place, leaving `other` untouched.
    ///
    /// The common monomial and the factors present in both operands stay factored;
    /// only the two cofactors are expanded and summed.
    pub fn add(&mut self, other: &FactoredPolynomial) {
        if other.zero {
            return;
        }
        if self.zero {
            *self = other.clone();
            return;
        }

        let common_shift = (
            self.shift.0.min(other.shift.0),
            self.shift.1.min(other.shift.1),
        );

        let mut used = vec![false; other.factors.len()];
        let mut common = Vec::new();
        let mut left_rest = Vec::new();
        for f in &self.factors {
            let hit = other
                .factors
                .iter()
                .enumerate()
                .position(|(k, g)| !used[k] && (Arc::ptr_eq(f, g) || f == g));
            match hit {
                Some(k) => {
                    used[k] = true;
                    common.push(Arc::clone(f));
                }
                None => left_rest.push(Arc::clone(f)),
            }
        }
        let right_rest = other
            .factors
            .iter()
            .zip(&used)
            .filter(|(_, u)| !**u)
            .map(|(g, _)| g);

        let left = expand_product(
            self.shift.0 - common_shift.0,
            self.shift.1 - common_shift.1,
            left_rest.iter(),
        );
        let right = expand_product(
            other.shift.0 - common_shift.0,
            other.shift.1 - common_shift.1,
            right_rest,
        );

        let mut sum = FactoredPolynomial::from(&left + &right);
        sum.shift.0 += common_shift.0;
        sum.shift.1 += common_shift.1;
        sum.factors.extend(common);
        *self = sum;
    }

    /// Multiplies out every factor.
    pub fn expand(&self) -> Polynomial {
        if self.zero {
            return Polynomial::zero();
        }
        expand_product(self.shift.0, self.shift.1, self.factors.iter())
    }

    /// Rough heap footprint, used for cache accounting.
    pub fn size_bytes(&self) -> usize {
        let per_term = std::mem::size_of::<(u32, u32)>() + std::mem::size_of::<BigUint>() + 16;
        std::mem::size_of::<Self>()
            + self
                .factors
                .iter()
                .map(|f| std::mem::size_of::<Polynomial>() + f.num_terms() * per_term)
                .sum::<usize>()
    }
}

fn expand_product<'a>(
    a: u32,
    b: u32,
    factors: impl Iterator<Item = &'a Arc<Polynomial>>,
) -> Polynomial {
    let mut acc = Polynomial::monomial(a, b);
    for f in factors {
        acc = &acc * f;
    }
    acc
}

impl PartialEq for FactoredPolynomial {
    fn eq(&self, other: &Self) -> bool {
        self.expand() == other.expand()
    }
}

impl Eq for FactoredPolynomial {}

impl fmt::Display for FactoredPolynomial {
    /// Shift first, then each distinct factor with its power: `X*(X + Y)^2`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.zero {
            return f.write_str("0");
        }
        let mut wrote = false;
        if self.shift != (0, 0) {
            write_monomial(f, self.shift.0, self.shift.1)?;
            wrote = true;
        }

        let mut done = vec![false; self.factors.len()];
        for (k, factor) in self.factors.iter().enumerate() {
            if done[k] {
                continue;
            }
            let mut power = 0;
            for (l, other) in self.factors.iter().enumerate().skip(k) {
                if !done[l] && (Arc::ptr_eq(factor, other) || factor == other) {
                    done[l] = true;
                    power += 1;
                }
            }
            if wrote {
                f.write_str("*")?;
            }
            if factor.num_terms() == 1 {
                write!(f, "{factor}")?;
            } else {
                write!(f, "({factor})")?;
            }
            if power > 1 {
                write!(f, "^{power}")?;
            }
            wrote = true;
        }

        if !wrote {
            f.write_str("1")?;
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use num_traits::Zero;

    fn eval(p: &Polynomial, x: u64, y: u64) -> BigUint {
        let (x, y) = (BigUint::from(x), BigUint::from(y));
        p.terms().map(|(i, j, c)| c * x.pow(i) * y.pow(j)).sum()
    }

    fn xy() -> FactoredPolynomial {
        let mut p = FactoredPolynomial::x(1);
        p.add(&FactoredPolynomial::y(1));
        p
    }

    #[test]
    fn y_range_bounds() {
        assert!(Polynomial::y_range(1, 0).is_zero());
        assert!(FactoredPolynomial::y_range(3, 2).is_zero());
        let p = Polynomial::y_range(0, 2);
        assert_eq!(p.to_string(), "Y^2 + Y + 1");
        assert_eq!(p.y_degree(), 2);
        assert_eq!(p.x_degree(), 0);
    }

    #[test]
    fn sum_keeps_common_factors() {
        let base = xy();
        let mut a = base.times_copy(&FactoredPolynomial::x(2));
        let b = base.times_copy(&FactoredPolynomial::y(1));
        a.add(&b);
        // X^2(X+Y) + Y(X+Y) = (X+Y)(X^2+Y)
        assert_eq!(a.num_factors(), 2);
        let expect = &Polynomial::monomial(1, 0) + &Polynomial::monomial(0, 1);
        let expect = &expect * &(&Polynomial::monomial(2, 0) + &Polynomial::monomial(0, 1));
        assert_eq!(a.expand(), expect);
    }

    #[test]
    fn sum_pulls_out_the_common_shift() {
        let mut a = FactoredPolynomial::monomial(2, 1);
        a.add(&FactoredPolynomial::monomial(1, 3));
        // X*Y*(X + Y^2)
        assert_eq!(a.to_string(), "X*Y*(X + Y^2)");
    }

    #[test]
    fn operands_are_not_mutated() {
        let a = xy();
        let b = FactoredPolynomial::y_range(0, 2);
        let before_a = a.expand();
        let before_b = b.expand();

        let c = a.times_copy(&b);
        let mut d = a.clone();
        d.add(&b);
        d.times(&b);

        assert_eq!(a.expand(), before_a);
        assert_eq!(b.expand(), before_b);
        assert_eq!(eval(&c.expand(), 1, 1), BigUint::from(6u32));
    }

    #[test]
    fn zero_and_one_identities() {
        let p = xy();
        let mut z = FactoredPolynomial::zero();
        z.add(&p);
        assert_eq!(z, p);

        let mut q = p.clone();
        q.times(&FactoredPolynomial::one());
        assert_eq!(q, p);

        q.times(&FactoredPolynomial::zero());
        assert!(q.is_zero());
        assert_eq!(q.to_string(), "0");
        assert_eq!(FactoredPolynomial::one().to_string(), "1");
    }

    #[test]
    fn display_groups_repeated_factors() {
        let base = xy();
        let mut p = FactoredPolynomial::x(1);
        p.times(&base);
        p.times(&base);
        assert_eq!(p.to_string(), "X*(X + Y)^2");
        assert_eq!(p.expand().to_string(), "X^3 + 2*X^2*Y + X*Y^2");
    }

    #[test]
    fn coefficients_grow_past_machine_words() {
        let base = xy();
        let mut p = FactoredPolynomial::one();
        for _ in 0..80 {
            p.times(&base);
        }
        let expanded = p.expand();
        // C(80, 40) > 2^64
        let c = expanded.coefficient(40, 40);
        assert_eq!(c.to_string(), "107507208733336176461620");
        assert_eq!(eval(&expanded, 1, 1), BigUint::from(2u32).pow(80));
    }

    #[test]
    fn terms_are_ascending() {
        let p = &Polynomial::y_range(0, 1) + &Polynomial::monomial(2, 0);
        let keys: Vec<(u32, u32)> = p.terms().map(|(i, j, _)| (i, j)).collect();
        assert_eq!(keys, vec![(0, 0), (0, 1), (2, 0)]);
        assert_eq!(p.coefficient(5, 5), BigUint::zero());
    }
}
