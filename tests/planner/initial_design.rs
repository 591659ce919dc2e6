use std::sync::{Arc, Mutex};

use bayes_planner::prelude::*;

fn space() -> ParameterSpace {
    ParameterSpace::new(vec![
        Parameter::continuous("x", -2.0, 2.0),
        Parameter::discrete("n", vec![1.0, 2.0, 4.0, 8.0]),
        Parameter::categorical("c", ["red", "green", "blue"]),
    ])
    .unwrap()
}

/// Records every `tell` and answers with batches of two copies.
struct Recording {
    told: Arc<Mutex<Vec<usize>>>,
    inner: RandomDesign,
}

impl InitialDesign for Recording {
    fn set_param_space(&mut self, space: &ParameterSpace) {
        self.inner.set_param_space(space);
    }

    fn tell(&mut self, iteration: usize) {
        self.told.lock().unwrap().push(iteration);
    }

    fn ask(&mut self) -> bayes_planner::Result<DesignProposal> {
        let p = self.inner.ask()?.into_first()?;
        Ok(DesignProposal::Batch(vec![p.clone(), p]))
    }
}

#[test]
fn initial_design_fills_every_slot_without_surrogates() {
    let mut planner = Planner::builder()
        .batch_size(4)
        .num_init_design(10)
        .random_seed(1)
        .build()
        .unwrap();
    planner.set_param_space(&space()).unwrap();

    let mut history = History::new();
    for round in 1..=2 {
        let batch = planner.ask(&history).unwrap();
        assert_eq!(batch.len(), 4);
        for p in batch {
            space().check_vector(&p).unwrap();
            history.push(p, 1.0);
        }
        assert_eq!(planner.num_init_design_completed(), 4 * round);
        assert!(planner.surrogates().is_none());
        assert!(planner.training_sets().is_none());
    }
}

#[test]
fn design_is_told_the_completed_count() {
    let told = Arc::new(Mutex::new(Vec::new()));
    let mut planner = Planner::builder()
        .batch_size(3)
        .initial_design(Recording {
            told: Arc::clone(&told),
            inner: RandomDesign::with_seed(2),
        })
        .build()
        .unwrap();
    planner.set_param_space(&space()).unwrap();

    planner.ask(&History::new()).unwrap();
    planner.ask(&History::new()).unwrap();
    assert_eq!(*told.lock().unwrap(), vec![0, 1, 2, 3, 4, 5]);
}

#[test]
fn only_the_first_vector_of_a_design_batch_is_used() {
    let mut planner = Planner::builder()
        .batch_size(2)
        .initial_design(Recording {
            told: Arc::default(),
            inner: RandomDesign::with_seed(3),
        })
        .build()
        .unwrap();
    planner.set_param_space(&space()).unwrap();

    let batch = planner.ask(&History::new()).unwrap();
    assert_eq!(batch.len(), 2);
    assert_ne!(batch[0], batch[1]);
}

#[test]
fn seeded_planners_repeat_their_designs() {
    let propose = || {
        let mut planner = Planner::builder().batch_size(3).random_seed(77).build().unwrap();
        planner.set_param_space(&space()).unwrap();
        planner.ask(&History::new()).unwrap()
    };
    assert_eq!(propose(), propose());
}

#[cfg(feature = "sobol")]
#[test]
fn sobol_design_proposes_admissible_points() {
    let mut planner = Planner::builder()
        .init_design_strategy(InitDesignStrategy::Sobol)
        .batch_size(5)
        .random_seed(4)
        .build()
        .unwrap();
    planner.set_param_space(&space()).unwrap();
    let batch = planner.ask(&History::new()).unwrap();
    assert_eq!(batch.len(), 5);
    assert!(batch.iter().all(|p| space().check_vector(p).is_ok()));
}
