//! Evolving trees with the `ga` module.
//!
//! Fitness is measured against a fixed set of cases: each case binds the tree's
//! arguments and states the value it should return. The penalties of all cases are
//! summed and negated, so fitter trees have a greater fitness.

use super::catalog::NodeCatalog;
use super::context::EvaluationStatus;
use super::gen::{Generator, UniformLiterals};
use super::ops::{self, DepthPreservingSelector, RemapLocalVariables, UniformSelector};
use super::subroutine::SubroutineRegistry;
use super::tree::{Outcome, Signature, Tree};
use super::value::{Value, Variable};
use crate::config::{EvaluationConfig, EvolutionConfig, GenerationConfig};
use crate::ga::{self, GeneticOperation, GeneticOperator, Individual};
use rand::Rng;
use tracing::trace;

/// One input binding and the value expected for it.
#[derive(Clone, Debug, PartialEq)]
pub struct Case {
    pub arguments: Vec<Value>,
    pub expected: Value,
}

/// Maps an evaluation outcome and the expected value to a non-negative penalty.
pub trait Penalty: Sync {
    fn penalty(&self, outcome: &Outcome, expected: &Value) -> f64;
}

/// The absolute difference for numbers and `0` or `1` for anything else. Faulted or
/// prematurely stopped evaluations cost `fault`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct AbsoluteError {
    pub fault: f64,
}

/// The environment in which a tree's fitness is tested.
#[derive(Debug)]
pub struct Environment<P> {
    pub cases: Vec<Case>,
    pub registry: SubroutineRegistry,
    pub evaluation: EvaluationConfig,
    pub penalty: P,
}

/// Produces each new generation from the previous one.
///
/// The population is sorted from least to most fit. The least fit share of the new
/// generation is generated at random, the next share mutated, then crossed over, and
/// the fittest are selected unchanged.
#[derive(Debug)]
pub struct TreeOperator {
    pub catalog: NodeCatalog,
    pub signature: Signature,
    pub literals: UniformLiterals,
    pub generation: GenerationConfig,
    pub evolution: EvolutionConfig,
}

impl Default for AbsoluteError {
    fn default() -> Self {
        AbsoluteError { fault: 1.0e6 }
    }
}

impl Penalty for AbsoluteError {
    fn penalty(&self, outcome: &Outcome, expected: &Value) -> f64 {
        let value = match (outcome.status, outcome.value.as_ref()) {
            (EvaluationStatus::ValueReturned, Some(value)) => value,
            _ => return self.fault,
        };
        let error = match (value, expected) {
            (&Value::Int(a), &Value::Int(b)) => (a as f64 - b as f64).abs(),
            (&Value::Float(a), &Value::Float(b)) => (a - b).abs(),
            (a, b) if a == b => 0.0,
            _ => 1.0,
        };
        if error.is_finite() {
            error.min(self.fault)
        } else {
            self.fault
        }
    }
}

impl<P: Penalty> Environment<P> {
    pub fn new(cases: Vec<Case>, penalty: P) -> Self {
        Environment {
            cases,
            registry: SubroutineRegistry::new(),
            evaluation: EvaluationConfig::default(),
            penalty,
        }
    }
}

impl<P: Penalty> Individual<Environment<P>> for Tree {
    type Fitness = f64;
    fn fitness(&self, env: &Environment<P>) -> Self::Fitness {
        let total: f64 = env
            .cases
            .iter()
            .map(|case| {
                let arguments = case.arguments.iter().cloned().map(Variable::new).collect();
                let outcome = self.evaluate(arguments, &env.registry, &env.evaluation);
                env.penalty.penalty(&outcome, &case.expected)
            })
            .sum();
        -total
    }
}

impl TreeOperator {
    pub fn new(
        catalog: NodeCatalog,
        signature: Signature,
        generation: GenerationConfig,
        evolution: EvolutionConfig,
    ) -> Self {
        let literals = UniformLiterals::from(&generation);
        TreeOperator {
            catalog,
            signature,
            literals,
            generation,
            evolution,
        }
    }

    fn generator(&self) -> Generator<UniformLiterals> {
        Generator::new(&self.catalog, &self.literals)
    }

    fn max_depth(&self) -> usize {
        self.generation.max_depth as usize
    }

    /// A random tree, as used to seed the first generation.
    pub fn random<R: Rng>(&self, rng: &mut R) -> crate::Result<Tree> {
        self.generator().ramped(rng, &self.signature, self.max_depth())
    }
}

impl<P: Penalty> GeneticOperator<Tree, Environment<P>> for TreeOperator {
    fn generate_individual<R: Rng>(
        &self,
        rng: &mut R,
        op: GeneticOperation<Tree, Environment<P>>,
    ) -> Tree {
        // Select the process type from:
        enum Kind {
            Random,
            Mutate,
            Crossover,
            Select,
        }

        let len = op.population.len() as f32;
        let random_index = (self.evolution.random_weight * len) as usize;
        let mutate_index = (random_index as f32 + self.evolution.mutate_weight * len) as usize;
        let crossover_index =
            (mutate_index as f32 + self.evolution.crossover_weight * len) as usize;

        let kind = if op.index < random_index {
            Kind::Random
        } else if op.index < mutate_index {
            Kind::Mutate
        } else if op.index < crossover_index {
            Kind::Crossover
        } else {
            Kind::Select
        };

        let current = &op.population[op.index].0;
        let generator = self.generator();
        let result = match kind {
            Kind::Random => self.random(rng),
            Kind::Mutate => {
                let mut tree = current.clone();
                ops::mutate(rng, &mut tree, &UniformSelector, &generator, self.max_depth())
                    .map(|_| tree)
            }
            Kind::Crossover => {
                let partner = ga::select_proportional(rng, op.population);
                let selector = DepthPreservingSelector {
                    max_depth: self.max_depth(),
                    retries: self.generation.crossover_retries,
                };
                ops::crossover(
                    rng,
                    current.clone(),
                    op.population[partner].0.clone(),
                    &selector,
                    &RemapLocalVariables,
                )
                .map(|(a, _)| a)
            }
            Kind::Select => Ok(current.clone()),
        };

        // A failed operation keeps the individual it started from.
        result.unwrap_or_else(|err| {
            trace!(error = %err, "genetic operation failed");
            current.clone()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ga::Simulation;
    use crate::gp::types::{Type, TypeCatalog};
    use rand::SeedableRng;
    use rand_xorshift::XorShiftRng;

    fn cases() -> Vec<Case> {
        let mut cases = vec![];
        for a in -3..3 {
            for b in -3..3 {
                cases.push(Case {
                    arguments: vec![Value::Int(a), Value::Int(b)],
                    expected: Value::Int(a + b + 1),
                });
            }
        }
        cases
    }

    fn operator() -> TreeOperator {
        let signature = Signature::new(Type::INT).with_arguments(vec![Type::INT, Type::INT]);
        let catalog =
            NodeCatalog::standard(TypeCatalog::standard(), &signature.arguments, &[]).unwrap();
        let generation = GenerationConfig {
            max_depth: 4,
            ..GenerationConfig::default()
        };
        let evolution = EvolutionConfig {
            population: 40,
            threads: 2,
            ..EvolutionConfig::default()
        };
        TreeOperator::new(catalog, signature, generation, evolution)
    }

    #[test]
    fn penalties() {
        let penalty = AbsoluteError::default();
        assert_eq!(penalty.penalty(&Outcome::returned(Value::Int(3)), &Value::Int(5)), 2.0);
        assert_eq!(penalty.penalty(&Outcome::returned(Value::Bool(true)), &Value::Bool(true)), 0.0);
        let yes = Outcome::returned(Value::Bool(true));
        assert_eq!(penalty.penalty(&yes, &Value::Bool(false)), 1.0);
        let faulted = Outcome {
            status: EvaluationStatus::InvalidValue,
            value: None,
        };
        assert_eq!(penalty.penalty(&faulted, &Value::Int(0)), penalty.fault);
    }

    #[test]
    fn exact_trees_have_zero_fitness() {
        use crate::gp::text;
        let env = Environment::new(cases(), AbsoluteError::default());
        let op = operator();
        let tree = text::read_tree(
            "+--Add<int>\n+--Argument<int,0>\n+--Add<int>\n+--Argument<int,1>\n+--Const<int,1>",
            op.signature.clone(),
            &op.catalog,
            &env.registry,
        )
        .unwrap();
        assert_eq!(tree.fitness(&env), 0.0);
    }

    #[test]
    fn evolution_does_not_lose_the_best() {
        crate::test_utils::init_test_logging();
        let env = Environment::new(cases(), AbsoluteError::default());
        let op = operator();
        let mut rng = XorShiftRng::seed_from_u64(2024);
        let population = (0..op.evolution.population)
            .map(|_| op.random(&mut rng).unwrap())
            .collect::<Vec<_>>();
        let mut sim = Simulation::with_num_threads(population, &env, op.evolution.threads);
        let initial_best = sim.most_fit().1;
        for _ in 0..5 {
            sim.step(&mut rng, &env, &op);
        }
        assert_eq!(sim.generation(), 5);
        assert_eq!(sim.population().len(), op.evolution.population);
        assert!(sim.most_fit().1 >= initial_best);
    }
}
