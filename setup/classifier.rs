use serde::{Deserialize, Serialize};

/// The grid of candidate values for one tunable hyper-parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TunePrior {
    pub name: String,
    pub values: Vec<f64>,
}

/// What the gatherer needs to know about the classifier a job ran with.
///
/// Implementations only describe the classifier; fitting and inference happen
/// in the jobs that produced the task output records.
pub trait Classifier: Clone + std::fmt::Debug {
    fn name(&self) -> &str;

    /// Tuning-prior configuration, in the classifier's declared order.
    fn tune_priors(&self) -> &[TunePrior];

    /// Number of hyper-parameter values tested per tuning split.
    fn test_count(&self) -> usize;

    /// Ordered names of the tunable hyper-parameters.
    fn tunable_params(&self) -> Vec<&str> {
        self.tune_priors().iter().map(|prior| prior.name.as_str()).collect()
    }

    /// Whether two jobs ran the same classifier. Tuning priors are compared
    /// separately so configuration drift can be reported on its own.
    fn same_classifier(&self, other: &Self) -> bool {
        self.name() == other.name() && self.test_count() == other.test_count()
    }
}

/// The classifier description serialized into each task output record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierSpec {
    pub name: String,
    pub tune_priors: Vec<TunePrior>,
    pub test_count: usize,
}

impl Classifier for ClassifierSpec {
    fn name(&self) -> &str {
        &self.name
    }

    fn tune_priors(&self) -> &[TunePrior] {
        &self.tune_priors
    }

    fn test_count(&self) -> usize {
        self.test_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lasso() -> ClassifierSpec {
        ClassifierSpec {
            name: "Lasso".to_string(),
            tune_priors: vec![
                TunePrior {
                    name: "fit__C".to_string(),
                    values: vec![0.01, 0.1, 1.0],
                },
                TunePrior {
                    name: "fit__l1_ratio".to_string(),
                    values: vec![0.5, 1.0],
                },
            ],
            test_count: 16,
        }
    }

    #[test]
    fn tunable_params_follow_prior_order() {
        assert_eq!(lasso().tunable_params(), vec!["fit__C", "fit__l1_ratio"]);
    }

    #[test]
    fn identity_ignores_tuning_priors() {
        let base = lasso();
        let mut retuned = lasso();
        retuned.tune_priors[0].values.push(10.0);
        assert!(base.same_classifier(&retuned));
        assert_ne!(base.tune_priors(), retuned.tune_priors());

        let mut other = lasso();
        other.name = "Ridge".to_string();
        assert!(!base.same_classifier(&other));

        let mut fewer_tests = lasso();
        fewer_tests.test_count = 8;
        assert!(!base.same_classifier(&fewer_tests));
    }
}
