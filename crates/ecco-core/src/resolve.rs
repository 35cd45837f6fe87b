//! Effective-default resolution for stratifying factors.
//!
//! A factor's nominal default comes from the catalog, but sparse datasets do
//! not always carry rows for it. For every (measure, factor) the effective
//! default is:
//!
//! 1. an explicit caller choice, if one was made;
//! 2. the nominal default, if it was observed for that measure;
//! 3. otherwise the lexicographically smallest observed value;
//! 4. otherwise (no rows at all) the nominal default.
//!
//! A factor that ends up with no value at all (no nominal default and no
//! observations) is left unconstrained.

use std::collections::{BTreeMap, BTreeSet};

use crate::{
  clause::FactorConstraints,
  error::{Error, Result},
  measure::{CategoryMeta, FactorDescriptor},
};

/// Per measure, per factor, the distinct values that co-occur with the
/// measure in stored rows.
pub type ObservedFactorValues = BTreeMap<String, BTreeMap<String, BTreeSet<String>>>;

/// Explicit caller choices that override computed defaults.
pub type FactorChoices = BTreeMap<String, BTreeMap<String, String>>;

/// The effective default of one factor given the values observed for one
/// measure.
pub fn effective_default(
  factor: &FactorDescriptor,
  observed: Option<&BTreeSet<String>>,
) -> Option<String> {
  let observed = observed.filter(|set| !set.is_empty());
  match (&factor.default, observed) {
    (Some(nominal), Some(set)) if set.contains(nominal) => Some(nominal.clone()),
    (_, Some(set)) => set.first().cloned(),
    (nominal, None) => nominal.clone(),
  }
}

/// Resolve constraints for each of `measures`.
pub fn resolve_constraints<'a, I>(
  meta: &CategoryMeta,
  measures: I,
  observed: &ObservedFactorValues,
  choices: &FactorChoices,
) -> FactorConstraints
where
  I: IntoIterator<Item = &'a str>,
{
  measures
    .into_iter()
    .map(|measure| {
      let seen = observed.get(measure);
      let chosen = choices.get(measure);
      let factors = meta
        .factors()
        .iter()
        .filter_map(|factor| {
          let value = chosen
            .and_then(|c| c.get(&factor.field).cloned())
            .or_else(|| {
              effective_default(factor, seen.and_then(|s| s.get(&factor.field)))
            })?;
          Some((factor.field.clone(), value))
        })
        .collect();
      (measure.to_owned(), factors)
    })
    .collect()
}

/// Constraints for an explicit query: caller filters where given, nominal
/// defaults for every other declared factor.
pub fn nominal_constraints(
  meta: &CategoryMeta,
  filters: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
  meta
    .factors()
    .iter()
    .filter_map(|factor| {
      filters
        .get(&factor.field)
        .or(factor.default.as_ref())
        .map(|value| (factor.field.clone(), value.clone()))
    })
    .collect()
}

/// Reject filters a category cannot honour.
pub fn validate_filters(
  category: &str,
  meta: &CategoryMeta,
  filters: &BTreeMap<String, String>,
) -> Result<()> {
  if filters.is_empty() {
    return Ok(());
  }
  if meta.factors().is_empty() {
    return Err(Error::FiltersWithoutFactors(category.to_owned()));
  }
  for key in filters.keys() {
    if meta.factor(key).is_none() {
      return Err(Error::UnknownFactor {
        scope:  format!("category {category:?}"),
        factor: key.clone(),
      });
    }
  }
  Ok(())
}
