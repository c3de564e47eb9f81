use super::{DerivedQuantitySet, ModelRegistry, ParameterSource, Quantity, SampleInput};
use crate::{
    constants::{SolarMass, MEARTH_MSUN},
    kepler::{planet_mass, semi_major_axis_au},
    postfit_errors::PostfitError,
};

/// Capability shared by every model able to turn samples into named quantities.
pub trait QuantityConverter {
    fn name(&self) -> &str;

    /// Compute the named quantities of this model.
    ///
    /// Arguments
    /// -----------------
    /// * `sample`: flat sample matrix or a single parameter row.
    /// * `registry`: shared models available for reference resolution.
    fn convert(
        &self,
        sample: SampleInput<'_>,
        registry: &ModelRegistry,
    ) -> Result<DerivedQuantitySet, PostfitError>;
}

/// Physical nature of a shared model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SharedKind {
    Generic,
    /// Keplerian companion; with a stellar mass, `M_Me` and `a_AU` are added.
    Planet { stellar_mass: Option<SolarMass> },
}

/// Model describing one physical entity, referenced by name by observation models.
#[derive(Debug, Clone, PartialEq)]
pub struct SharedModel {
    name: String,
    kind: SharedKind,
    quantities: Vec<(String, ParameterSource)>,
}

impl SharedModel {
    pub fn new(name: impl Into<String>, kind: SharedKind) -> Self {
        Self {
            name: name.into(),
            kind,
            quantities: Vec::new(),
        }
    }

    pub fn with_quantity(mut self, name: impl Into<String>, source: ParameterSource) -> Self {
        self.quantities.push((name.into(), source));
        self
    }

    pub fn kind(&self) -> SharedKind {
        self.kind
    }

    pub fn is_planet(&self) -> bool {
        matches!(self.kind, SharedKind::Planet { .. })
    }

    pub fn quantities(&self) -> &[(String, ParameterSource)] {
        &self.quantities
    }
}

/// Resolve a list of declared quantities against a sample.
fn resolve_declared(
    declared: &[(String, ParameterSource)],
    sample: SampleInput<'_>,
) -> Result<DerivedQuantitySet, PostfitError> {
    let mut out = DerivedQuantitySet::new();
    for (name, source) in declared {
        out.insert(name.clone(), sample.resolve(*source)?);
    }
    Ok(out)
}

/// Minimum mass (Earth masses) and semi-major axis (AU) of a planet.
fn add_planet_quantities(
    out: &mut DerivedQuantitySet,
    stellar_mass: SolarMass,
) -> Result<(), PostfitError> {
    let (Some(period), Some(k)) = (out.get("P"), out.get("K")) else {
        return Ok(());
    };
    let ecc = out.get("e").cloned().unwrap_or(Quantity::Scalar(0.0));

    let mass_msun = Quantity::zip_map(&[period, k, &ecc], |x| {
        planet_mass(x[0], x[1], x[2], stellar_mass)
    })?;
    let a_au = Quantity::zip_map(&[period, &mass_msun], |x| {
        Ok(semi_major_axis_au(x[0], stellar_mass, x[1]))
    })?;
    let m_me = Quantity::zip_map(&[&mass_msun], |x| Ok(x[0] / MEARTH_MSUN))?;

    out.insert("M_Me", m_me);
    out.insert("a_AU", a_au);
    Ok(())
}

impl QuantityConverter for SharedModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn convert(
        &self,
        sample: SampleInput<'_>,
        _registry: &ModelRegistry,
    ) -> Result<DerivedQuantitySet, PostfitError> {
        let mut out = resolve_declared(&self.quantities, sample)?;
        if let SharedKind::Planet {
            stellar_mass: Some(ms),
        } = self.kind
        {
            add_planet_quantities(&mut out, ms)?;
        }
        Ok(out)
    }
}

/// Dataset/instrument-specific model, possibly referencing shared models.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservationModel {
    name: String,
    common_refs: Vec<String>,
    quantities: Vec<(String, ParameterSource)>,
}

impl ObservationModel {
    pub fn new<I, S>(name: impl Into<String>, common_refs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            common_refs: common_refs.into_iter().map(Into::into).collect(),
            quantities: Vec::new(),
        }
    }

    pub fn with_quantity(mut self, name: impl Into<String>, source: ParameterSource) -> Self {
        self.quantities.push((name.into(), source));
        self
    }

    pub fn common_refs(&self) -> &[String] {
        &self.common_refs
    }

    /// Quantities declared by this model only, without the referenced shared models.
    pub fn convert_own(&self, sample: SampleInput<'_>) -> Result<DerivedQuantitySet, PostfitError> {
        resolve_declared(&self.quantities, sample)
    }
}

impl QuantityConverter for ObservationModel {
    fn name(&self) -> &str {
        &self.name
    }

    /// Merge the referenced shared models in declaration order, then the own quantities.
    ///
    /// Return
    /// ----------
    /// * [`PostfitError::UnknownModelReference`] if a reference is not in `registry`.
    fn convert(
        &self,
        sample: SampleInput<'_>,
        registry: &ModelRegistry,
    ) -> Result<DerivedQuantitySet, PostfitError> {
        let mut out = DerivedQuantitySet::new();
        for reference in &self.common_refs {
            let shared =
                registry
                    .get(reference)
                    .ok_or_else(|| PostfitError::UnknownModelReference {
                        model: self.name.clone(),
                        reference: reference.clone(),
                    })?;
            out.merge(shared.convert(sample, registry)?);
        }
        out.merge(self.convert_own(sample)?);
        Ok(out)
    }
}

#[cfg(test)]
mod models_test {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::DMatrix;

    fn planet(stellar_mass: Option<f64>) -> SharedModel {
        SharedModel::new("b", SharedKind::Planet { stellar_mass })
            .with_quantity("P", ParameterSource::Sampled(0))
            .with_quantity("K", ParameterSource::Sampled(1))
            .with_quantity("e", ParameterSource::Fixed(0.0))
    }

    fn registry() -> ModelRegistry {
        let mut reg = ModelRegistry::default();
        reg.register(planet(Some(1.0))).unwrap();
        reg
    }

    #[test]
    fn test_observation_merges_shared_keys() {
        let reg = registry();
        let rv = ObservationModel::new("harps", ["b"])
            .with_quantity("jitter", ParameterSource::Sampled(2))
            .with_quantity("e", ParameterSource::Fixed(0.3));

        let out = rv.convert(SampleInput::Row(&[365.25, 0.0894, 1.5]), &reg).unwrap();
        let names: Vec<&str> = out.names().collect();
        for key in ["P", "K", "e", "M_Me", "a_AU", "jitter"] {
            assert!(names.contains(&key), "missing {key}");
        }
        // own key wins
        assert_eq!(out.get("e"), Some(&Quantity::Scalar(0.3)));
        assert_relative_eq!(
            out.get("M_Me").unwrap().as_scalar().unwrap(),
            1.0,
            epsilon = 0.01
        );
    }

    #[test]
    fn test_matrix_and_row_share_keys() {
        let reg = registry();
        let rv = ObservationModel::new("harps", ["b"])
            .with_quantity("jitter", ParameterSource::Sampled(2));
        let m = DMatrix::from_row_slice(2, 3, &[10., 5., 1., 11., 6., 2.]);

        let full = rv.convert(SampleInput::Matrix(&m), &reg).unwrap();
        let row = rv.convert(SampleInput::Row(&[10., 5., 1.]), &reg).unwrap();
        assert_eq!(full.names().collect::<Vec<_>>(), row.names().collect::<Vec<_>>());
        assert_eq!(full.is_free("M_Me"), Some(true));
        assert_eq!(full.is_free("e"), Some(false));
    }

    #[test]
    fn test_brown_dwarf_samples_do_not_abort() {
        // second row is a companion of about 24 solar masses around a 1 solar-mass star
        let reg = ModelRegistry::default();
        let m = DMatrix::from_row_slice(2, 2, &[365.25, 0.0894, 1000.0, 60000.0]);
        let out = planet(Some(1.0)).convert(SampleInput::Matrix(&m), &reg).unwrap();
        let Some(Quantity::Vector(mass)) = out.get("M_Me") else {
            panic!("M_Me should vary across samples");
        };
        assert_relative_eq!(mass[0], 1.0, epsilon = 0.01);
        assert_relative_eq!(mass[1] * MEARTH_MSUN, 24.263, max_relative = 1e-3);
    }

    #[test]
    fn test_planet_without_stellar_mass() {
        let reg = ModelRegistry::default();
        let out = planet(None).convert(SampleInput::Row(&[10., 5.]), &reg).unwrap();
        assert!(!out.contains("M_Me"));
        assert_eq!(out.len(), 3);
    }

    #[test]
    fn test_unknown_reference() {
        let rv = ObservationModel::new("harps", ["c"]);
        assert_eq!(
            rv.convert(SampleInput::Row(&[]), &registry()),
            Err(PostfitError::UnknownModelReference {
                model: "harps".into(),
                reference: "c".into()
            })
        );
    }
}
