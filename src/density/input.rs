use nalgebra::DMatrix;

use super::{reduce, DensityConfig, DensityReduction};
use crate::{
    constants::LN_PROB_NAME,
    derived::DerivedQuantitySet,
    posterior::FlatPosteriorSample,
    postfit_errors::PostfitError,
    run_context::RunContext,
    summary::{summarize_columns, ParameterSummary},
};

/// Named `n_samples × m` matrix handed to the density reduction, with its per-column summary.
#[derive(Debug, Clone, PartialEq)]
pub struct DensityInput {
    names: Vec<String>,
    matrix: DMatrix<f64>,
    summary: ParameterSummary,
}

impl DensityInput {
    /// Return
    /// ----------
    /// * [`PostfitError::DataFormat`] if the name count differs from the column count or a
    ///   name is repeated.
    pub fn new(names: Vec<String>, matrix: DMatrix<f64>) -> Result<Self, PostfitError> {
        if names.len() != matrix.ncols() {
            return Err(PostfitError::DataFormat(format!(
                "{} variable names for {} columns",
                names.len(),
                matrix.ncols()
            )));
        }
        if let Some(dup) = names
            .iter()
            .enumerate()
            .find_map(|(i, n)| names[..i].contains(n).then_some(n))
        {
            return Err(PostfitError::DataFormat(format!(
                "variable '{dup}' appears twice in the density input"
            )));
        }
        let summary = summarize_columns(&matrix);
        Ok(Self {
            names,
            matrix,
            summary,
        })
    }

    /// Gather every free sampled parameter, every free derived quantity and the
    /// log-posterior (last, named `ln_prob`).
    ///
    /// Arguments
    /// -----------------
    /// * `sample`: the flat posterior sample.
    /// * `ctx`: run context, providing the sampled parameter names.
    /// * `derived`: `(prefix, set)` pairs computed on the whole sample; a quantity is named
    ///   `<prefix>_<name>` (or `<name>` for an empty prefix). Names already present, such as
    ///   a sampled parameter passed through unchanged, are not repeated.
    pub fn assemble(
        sample: &FlatPosteriorSample,
        ctx: &RunContext,
        derived: &[(String, DerivedQuantitySet)],
    ) -> Result<Self, PostfitError> {
        let n = sample.n_samples();
        let mut names: Vec<String> = ctx.parameters().names().to_vec();
        let mut columns: Vec<Vec<f64>> = (0..sample.n_dims()).map(|j| sample.column(j)).collect();

        for (prefix, set) in derived {
            for (name, quantity) in set.free() {
                let full = if prefix.is_empty() {
                    name.to_string()
                } else {
                    format!("{prefix}_{name}")
                };
                if names.contains(&full) {
                    log::debug!("Density input: '{full}' already present");
                    continue;
                }
                columns.push(quantity.broadcast(n)?.iter().copied().collect());
                names.push(full);
            }
        }

        names.push(LN_PROB_NAME.to_string());
        columns.push(sample.log_posterior().iter().copied().collect());

        let matrix = DMatrix::from_fn(n, columns.len(), |i, j| columns[j][i]);
        Self::new(names, matrix)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.matrix
    }

    pub fn summary(&self) -> &ParameterSummary {
        &self.summary
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn column(&self, j: usize) -> Vec<f64> {
        self.matrix.column(j).iter().copied().collect()
    }

    pub fn reduce(&self, config: &DensityConfig) -> DensityReduction {
        reduce(self, config)
    }
}

#[cfg(test)]
mod input_test {
    use super::*;
    use crate::derived::Quantity;
    use nalgebra::DVector;

    #[test]
    fn test_assemble_order() {
        let sample = FlatPosteriorSample::from_rows(
            &[vec![1., 2.], vec![3., 4.], vec![5., 6.]],
            vec![-1., -2., -3.],
        )
        .unwrap();
        let ctx = RunContext::new(["b_P", "b_K"].into_iter().collect(), 10, 0.0).unwrap();

        let mut set = DerivedQuantitySet::new();
        set.insert("P", Quantity::Vector(DVector::from_vec(vec![1., 3., 5.])));
        set.insert("e", Quantity::Scalar(0.0));
        set.insert("M_Me", Quantity::Vector(DVector::from_vec(vec![7., 8., 9.])));

        let input = DensityInput::assemble(&sample, &ctx, &[("b".into(), set)]).unwrap();
        assert_eq!(input.names(), &["b_P", "b_K", "b_M_Me", "ln_prob"]);
        assert_eq!(input.column(2), vec![7., 8., 9.]);
        assert_eq!(input.column(3), vec![-1., -2., -3.]);
        assert_eq!(input.summary().len(), 4);
    }

    #[test]
    fn test_name_checks() {
        let m = DMatrix::zeros(2, 2);
        assert!(DensityInput::new(vec!["a".into()], m.clone()).is_err());
        assert!(DensityInput::new(vec!["a".into(), "a".into()], m).is_err());
    }
}
