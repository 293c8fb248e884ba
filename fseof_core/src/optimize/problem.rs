//! Provides struct representing an optimization problem
use crate::optimize::constraint::Constraint;
use crate::optimize::objective::{Objective, ObjectiveSense, ObjectiveTerm};
use crate::optimize::solvers::{Solver, SolverError};
use crate::optimize::variable::{Variable, VariableBuilder};
use crate::optimize::ProblemSolution;
use indexmap::IndexMap;
use thiserror::Error;

/// A linear optimization problem
#[derive(Debug, Clone)]
pub struct Problem {
    /// Objective to optimize
    objective: Objective,
    /// Variables of the optimization problem, in column order
    variables: IndexMap<String, Variable>,
    /// Constraints of the optimization problem, keyed by id
    constraints: IndexMap<String, Constraint>,
}

impl Problem {
    // region Creation Functions
    /// Create a new optimization problem
    pub fn new(objective_sense: ObjectiveSense) -> Self {
        Self {
            objective: Objective::new(objective_sense),
            variables: IndexMap::new(),
            constraints: IndexMap::new(),
        }
    }

    /// Create a new maximization problem
    pub fn new_maximization() -> Self {
        Self::new(ObjectiveSense::Maximize)
    }

    /// Create a new minimization problem
    pub fn new_minimization() -> Self {
        Self::new(ObjectiveSense::Minimize)
    }
    // endregion Creation Functions

    // region Accessors
    pub fn objective(&self) -> &Objective {
        &self.objective
    }

    pub fn variables(&self) -> &IndexMap<String, Variable> {
        &self.variables
    }

    pub fn constraints(&self) -> &IndexMap<String, Constraint> {
        &self.constraints
    }

    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    pub fn num_constraints(&self) -> usize {
        self.constraints.len()
    }
    // endregion Accessors

    /// Update the objective sense of the problem
    pub fn update_objective_sense(&mut self, sense: ObjectiveSense) {
        self.objective.set_sense(sense);
    }

    // region Adding Variables
    /// Add a variable to the optimization problem
    pub fn add_variable(&mut self, mut variable: Variable) -> Result<(), ProblemError> {
        if self.variables.contains_key(&variable.id) {
            return Err(ProblemError::VariableIdAlreadyExists(variable.id));
        }
        if variable.lower_bound > variable.upper_bound {
            return Err(ProblemError::InvalidVariableBounds(variable.id));
        }
        variable.index = self.variables.len();
        self.variables.insert(variable.id.clone(), variable);
        Ok(())
    }

    /// Create a new variable and add it to the optimization problem
    pub fn add_new_variable(
        &mut self,
        id: &str,
        name: Option<&str>,
        lower_bound: f64,
        upper_bound: f64,
    ) -> Result<(), ProblemError> {
        let variable = VariableBuilder::default()
            .id(id)
            .name(name.map(|n| n.to_string()))
            .lower_bound(lower_bound)
            .upper_bound(upper_bound)
            .build()
            .map_err(|err| ProblemError::InvalidVariable(err.to_string()))?;
        self.add_variable(variable)
    }
    // endregion Adding Variables

    // region Adding Constraints
    /// Add a constraint to the problem under `id`
    pub fn add_constraint(&mut self, id: &str, constraint: Constraint) -> Result<(), ProblemError> {
        self.validate_constraint(id, &constraint)?;
        self.constraints.insert(id.to_string(), constraint);
        Ok(())
    }

    /// Create a new equality constraint and add it to the problem
    pub fn add_new_equality_constraint_by_id(
        &mut self,
        id: &str,
        variables: &[&str],
        coefficients: &[f64],
        equals: f64,
    ) -> Result<(), ProblemError> {
        self.add_constraint(id, Constraint::new_equality(variables, coefficients, equals))
    }

    /// Create a new inequality constraint and add it to the problem
    pub fn add_new_inequality_constraint_by_id(
        &mut self,
        id: &str,
        variables: &[&str],
        coefficients: &[f64],
        lower_bound: f64,
        upper_bound: f64,
    ) -> Result<(), ProblemError> {
        self.add_constraint(
            id,
            Constraint::new_inequality(variables, coefficients, lower_bound, upper_bound),
        )
    }

    /// Remove a constraint (by id) from the problem
    pub fn remove_constraint(&mut self, constraint_id: &str) -> Option<Constraint> {
        self.constraints.shift_remove(constraint_id)
    }
    // endregion Adding Constraints

    // region Objective Terms
    /// Add a new linear term to the objective using the variable id
    pub fn add_new_linear_objective_term_by_id(
        &mut self,
        variable_id: &str,
        coefficient: f64,
    ) -> Result<(), ProblemError> {
        if !self.variables.contains_key(variable_id) {
            return Err(ProblemError::NonExistentVariablesInObjective(
                variable_id.to_string(),
            ));
        }
        self.objective
            .add_term(ObjectiveTerm::new(variable_id, coefficient));
        Ok(())
    }

    /// Remove all terms from the objective
    pub fn remove_all_objective_terms(&mut self) {
        self.objective.remove_all_terms();
    }
    // endregion Objective Terms

    /// Update the bounds of a variable
    pub fn update_variable_bounds(
        &mut self,
        id: &str,
        lower_bound: f64,
        upper_bound: f64,
    ) -> Result<(), ProblemError> {
        if lower_bound > upper_bound {
            return Err(ProblemError::InvalidVariableBounds(id.to_string()));
        }
        match self.variables.get_mut(id) {
            Some(var) => {
                var.lower_bound = lower_bound;
                var.upper_bound = upper_bound;
                Ok(())
            }
            None => Err(ProblemError::NonExistentVariable(id.to_string())),
        }
    }

    /// Solve the problem with the provided solver
    pub fn solve<S: Solver + ?Sized>(&self, solver: &S) -> Result<ProblemSolution, SolverError> {
        solver.solve(self)
    }

    /// Check that a constraint is valid to add to this Problem
    fn validate_constraint(&self, id: &str, constraint: &Constraint) -> Result<(), ProblemError> {
        if self.constraints.contains_key(id) {
            return Err(ProblemError::ConstraintAlreadyExists(id.to_string()));
        }
        if let Constraint::Inequality {
            lower_bound,
            upper_bound,
            ..
        } = constraint
        {
            if lower_bound > upper_bound {
                return Err(ProblemError::InvalidConstraintBounds(id.to_string()));
            }
        }
        if let Some(missing) = constraint
            .get_variables()
            .find(|var| !self.variables.contains_key(*var))
        {
            return Err(ProblemError::NonExistentVariablesInConstraint(
                missing.to_string(),
            ));
        }
        Ok(())
    }
}

/// Errors associated with the Problem
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProblemError {
    /// Error when trying to add a variable with the same id as an existing variable
    #[error("Tried to add variable {0} which already exists")]
    VariableIdAlreadyExists(String),
    /// Error when a variable could not be built
    #[error("Unable to build variable: {0}")]
    InvalidVariable(String),
    /// Error when trying to add variable with invalid bounds
    #[error("Variable {0} has lower_bound > upper_bound")]
    InvalidVariableBounds(String),
    /// Error when trying to add a constraint with the same id as an existing constraint
    #[error("Tried to add constraint {0} which already exists")]
    ConstraintAlreadyExists(String),
    /// Error when trying to add a constraint with invalid bounds
    #[error("Inequality constraint {0} has lower_bound > upper_bound")]
    InvalidConstraintBounds(String),
    /// Error when trying to add a constraint that contains variables not in the problem
    #[error("Constraint references variable {0} which is not in the problem")]
    NonExistentVariablesInConstraint(String),
    /// Error when trying to add an objective term which includes variables not in the problem
    #[error("Objective references variable {0} which is not in the problem")]
    NonExistentVariablesInObjective(String),
    /// Error when trying to perform an update on a variable that doesn't exist
    #[error("Variable {0} doesn't exist")]
    NonExistentVariable(String),
}
