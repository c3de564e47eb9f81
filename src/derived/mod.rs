//! # Derived quantities
//!
//! Converts raw sampled parameters into named physical quantities through the models of a
//! fit. Two model kinds expose the same [`QuantityConverter`] capability:
//!
//! * [`SharedModel`] – a physical entity (typically a planet) referenced by name,
//! * [`ObservationModel`] – dataset/instrument specific, which merges the output of the
//!   shared models it references (looked up in an explicit [`ModelRegistry`]) and then adds
//!   its own quantities. Its own keys win on collision.
//!
//! A conversion can be applied to the whole flat sample ([`SampleInput::Matrix`], one
//! vector per sampled quantity) or to a single parameter row ([`SampleInput::Row`], used for
//! the median and MAP vectors). Both call shapes yield the same key set.
//!
//! ## Example
//!
//! ```rust
//! use orbpost::derived::{
//!     ModelRegistry, ObservationModel, ParameterSource, QuantityConverter,
//!     SampleInput, SharedKind, SharedModel,
//! };
//!
//! # fn demo() -> Result<(), orbpost::postfit_errors::PostfitError> {
//! let planet = SharedModel::new("b", SharedKind::Planet { stellar_mass: Some(1.0) })
//!     .with_quantity("P", ParameterSource::Sampled(0))
//!     .with_quantity("K", ParameterSource::Sampled(1))
//!     .with_quantity("e", ParameterSource::Fixed(0.0));
//!
//! let mut registry = ModelRegistry::default();
//! registry.register(planet)?;
//!
//! let rv = ObservationModel::new("RV_harps", ["b"]).with_quantity("jitter", ParameterSource::Sampled(2));
//! let values = rv.convert(SampleInput::Row(&[10.0, 5.0, 1.2]), &registry)?;
//! assert!(values.get("M_Me").is_some());
//! # Ok(()) }
//! ```
pub mod models;
pub mod registry;

use nalgebra::{DMatrix, DVector};

use crate::postfit_errors::PostfitError;
pub use models::{ObservationModel, QuantityConverter, SharedKind, SharedModel};
pub use registry::ModelRegistry;

/// Value of one derived quantity: one value per sample, or a single value.
#[derive(Debug, Clone, PartialEq)]
pub enum Quantity {
    Scalar(f64),
    Vector(DVector<f64>),
}

impl Quantity {
    /// Number of stored values.
    pub fn size(&self) -> usize {
        match self {
            Quantity::Scalar(_) => 1,
            Quantity::Vector(v) => v.len(),
        }
    }

    /// Free (sampled) when more than one value is stored.
    pub fn is_free(&self) -> bool {
        self.size() > 1
    }

    /// Value at sample `i`; scalars are constant.
    pub fn at(&self, i: usize) -> f64 {
        match self {
            Quantity::Scalar(x) => *x,
            Quantity::Vector(v) => v[i],
        }
    }

    /// Single value of a scalar, or of a one-element vector.
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            Quantity::Scalar(x) => Some(*x),
            Quantity::Vector(v) if v.len() == 1 => Some(v[0]),
            Quantity::Vector(_) => None,
        }
    }

    /// Expand into a vector of length `n`.
    pub fn broadcast(&self, n: usize) -> Result<DVector<f64>, PostfitError> {
        match self {
            Quantity::Scalar(x) => Ok(DVector::from_element(n, *x)),
            Quantity::Vector(v) if v.len() == n => Ok(v.clone()),
            Quantity::Vector(v) => Err(PostfitError::DataFormat(format!(
                "cannot broadcast a {}-sample quantity to {n} samples",
                v.len()
            ))),
        }
    }

    /// Apply `f` element-wise over several quantities.
    ///
    /// All-scalar inputs give a scalar; otherwise every vector input must share the same
    /// length and scalars are broadcast.
    pub fn zip_map<F>(inputs: &[&Quantity], f: F) -> Result<Quantity, PostfitError>
    where
        F: Fn(&[f64]) -> Result<f64, PostfitError>,
    {
        let sizes: Vec<usize> = inputs
            .iter()
            .filter_map(|q| match q {
                Quantity::Vector(v) => Some(v.len()),
                Quantity::Scalar(_) => None,
            })
            .collect();

        let mut args = vec![0.0; inputs.len()];
        let Some(&n) = sizes.first() else {
            for (a, q) in args.iter_mut().zip(inputs) {
                *a = q.at(0);
            }
            return Ok(Quantity::Scalar(f(&args)?));
        };
        if sizes.iter().any(|&s| s != n) {
            return Err(PostfitError::DataFormat(format!(
                "element-wise operation over vectors of different lengths {sizes:?}"
            )));
        }

        let mut out = DVector::zeros(n);
        for i in 0..n {
            for (a, q) in args.iter_mut().zip(inputs) {
                *a = q.at(i);
            }
            out[i] = f(&args)?;
        }
        Ok(Quantity::Vector(out))
    }
}

/// Origin of a declared quantity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParameterSource {
    /// Column of the sampled parameter vector.
    Sampled(usize),
    /// Value held fixed during the fit.
    Fixed(f64),
}

/// Flat sample or single parameter row handed to a conversion.
#[derive(Debug, Clone, Copy)]
pub enum SampleInput<'a> {
    Matrix(&'a DMatrix<f64>),
    Row(&'a [f64]),
}

impl SampleInput<'_> {
    pub fn n_dims(&self) -> usize {
        match self {
            SampleInput::Matrix(m) => m.ncols(),
            SampleInput::Row(r) => r.len(),
        }
    }

    /// Resolve a [`ParameterSource`]: a column vector (matrix), a scalar (row or fixed).
    pub fn resolve(&self, source: ParameterSource) -> Result<Quantity, PostfitError> {
        let j = match source {
            ParameterSource::Fixed(x) => return Ok(Quantity::Scalar(x)),
            ParameterSource::Sampled(j) => j,
        };
        if j >= self.n_dims() {
            return Err(PostfitError::DataFormat(format!(
                "parameter column {j} out of range for {} sampled dimensions",
                self.n_dims()
            )));
        }
        Ok(match self {
            SampleInput::Matrix(m) => Quantity::Vector(m.column(j).into_owned()),
            SampleInput::Row(r) => Quantity::Scalar(r[j]),
        })
    }
}

/// Ordered mapping `name → Quantity`.
///
/// Insertion order is preserved; inserting an existing name replaces its value in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DerivedQuantitySet {
    entries: Vec<(String, Quantity)>,
}

impl DerivedQuantitySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Quantity) {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((name, value)),
        }
    }

    /// Insert every entry of `other`, its values winning on collision.
    pub fn merge(&mut self, other: DerivedQuantitySet) {
        for (name, value) in other.entries {
            self.insert(name, value);
        }
    }

    pub fn get(&self, name: &str) -> Option<&Quantity> {
        self.entries
            .iter()
            .find_map(|(n, q)| (n == name).then_some(q))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Quantity)> {
        self.entries.iter().map(|(n, q)| (n.as_str(), q))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `Some(true)` for a sampled quantity, `Some(false)` for a fixed one.
    pub fn is_free(&self, name: &str) -> Option<bool> {
        self.get(name).map(Quantity::is_free)
    }

    /// Free quantities only, in insertion order.
    pub fn free(&self) -> impl Iterator<Item = (&str, &Quantity)> {
        self.iter().filter(|(_, q)| q.is_free())
    }

    /// Same set with every scalar expanded to a constant vector of length `n`.
    pub fn broadcast(&self, n: usize) -> Result<DerivedQuantitySet, PostfitError> {
        let entries = self
            .entries
            .iter()
            .map(|(name, q)| Ok((name.clone(), Quantity::Vector(q.broadcast(n)?))))
            .collect::<Result<_, PostfitError>>()?;
        Ok(DerivedQuantitySet { entries })
    }

    /// Single value of every entry, for sets built from one parameter row.
    pub fn scalars(&self) -> Vec<(&str, f64)> {
        self.entries
            .iter()
            .filter_map(|(n, q)| q.as_scalar().map(|x| (n.as_str(), x)))
            .collect()
    }
}

#[cfg(test)]
mod derived_test {
    use super::*;

    #[test]
    fn test_insert_keeps_order_and_replaces() {
        let mut set = DerivedQuantitySet::new();
        set.insert("P", Quantity::Scalar(1.0));
        set.insert("K", Quantity::Scalar(2.0));
        set.insert("P", Quantity::Scalar(3.0));
        assert_eq!(set.names().collect::<Vec<_>>(), vec!["P", "K"]);
        assert_eq!(set.get("P"), Some(&Quantity::Scalar(3.0)));
    }

    #[test]
    fn test_free_and_broadcast() {
        let mut set = DerivedQuantitySet::new();
        set.insert("P", Quantity::Vector(DVector::from_vec(vec![1.0, 2.0, 3.0])));
        set.insert("e", Quantity::Scalar(0.0));
        assert_eq!(set.is_free("P"), Some(true));
        assert_eq!(set.is_free("e"), Some(false));
        assert_eq!(set.is_free("missing"), None);
        assert_eq!(set.free().count(), 1);

        let wide = set.broadcast(3).unwrap();
        assert_eq!(
            wide.get("e"),
            Some(&Quantity::Vector(DVector::from_element(3, 0.0)))
        );
        assert!(set.broadcast(4).is_err());
    }

    #[test]
    fn test_one_sample_vector_counts_as_fixed() {
        let q = Quantity::Vector(DVector::from_vec(vec![4.0]));
        assert!(!q.is_free());
        assert_eq!(q.as_scalar(), Some(4.0));
    }

    #[test]
    fn test_zip_map() {
        let a = Quantity::Vector(DVector::from_vec(vec![1.0, 2.0]));
        let b = Quantity::Scalar(10.0);
        let sum = Quantity::zip_map(&[&a, &b], |x| Ok(x[0] + x[1])).unwrap();
        assert_eq!(sum, Quantity::Vector(DVector::from_vec(vec![11.0, 12.0])));

        let s = Quantity::zip_map(&[&b, &b], |x| Ok(x[0] * x[1])).unwrap();
        assert_eq!(s, Quantity::Scalar(100.0));

        let c = Quantity::Vector(DVector::from_vec(vec![1.0, 2.0, 3.0]));
        assert!(Quantity::zip_map(&[&a, &c], |x| Ok(x[0])).is_err());
    }

    #[test]
    fn test_resolve_sources() {
        let m = DMatrix::from_row_slice(2, 2, &[1., 2., 3., 4.]);
        let mat = SampleInput::Matrix(&m);
        assert_eq!(
            mat.resolve(ParameterSource::Sampled(1)).unwrap(),
            Quantity::Vector(DVector::from_vec(vec![2., 4.]))
        );
        let row = SampleInput::Row(&[5., 6.]);
        assert_eq!(row.resolve(ParameterSource::Sampled(0)).unwrap(), Quantity::Scalar(5.));
        assert_eq!(row.resolve(ParameterSource::Fixed(0.5)).unwrap(), Quantity::Scalar(0.5));
        assert!(row.resolve(ParameterSource::Sampled(2)).is_err());
    }
}
