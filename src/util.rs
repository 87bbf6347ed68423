//! Description helpers: cartesian expansion and extended integer ranges.

use crate::{Attributes, FootprintError, Result, Value};

/// Upper bound on the number of descriptions [`expand`] may produce.
pub const EXPANSION_LIMIT: usize = 10_000;

const EXPANSION_PASSES: usize = 100;

/// Expand `desc` into one description per combination of its expandable values.
///
/// List values, `range(a[,b[,c]])` strings (inclusive end) and comma separated
/// strings each yield one description per item. Keys keep their order.
///
/// ```
/// use footprints::{desc, util::expand, Value};
///
/// let all = expand(&desc! { "test" => "alpha", "term" => "range(0,12,6)" }).unwrap();
/// let terms: Vec<_> = all.iter().map(|d| d["term"].clone()).collect();
/// assert_eq!(terms, vec![Value::Int(0), Value::Int(6), Value::Int(12)]);
/// ```
pub fn expand(desc: &Attributes) -> Result<Vec<Attributes>> {
    expand_with_limit(desc, EXPANSION_LIMIT)
}

/// Same as [`expand`] with an explicit bound on the result size.
pub fn expand_with_limit(desc: &Attributes, limit: usize) -> Result<Vec<Attributes>> {
    let mut current = vec![desc.clone()];
    let mut passes = 0;

    loop {
        passes += 1;
        if passes > EXPANSION_PASSES {
            tracing::warn!(passes, "description expansion does not settle, stopping");
            break;
        }

        let mut changed = false;
        let mut next = Vec::with_capacity(current.len());
        for d in current {
            match split_first(&d)? {
                Some((key, items)) => {
                    changed = true;
                    for item in items {
                        let mut copy = d.clone();
                        copy.insert(key.clone(), item);
                        next.push(copy);
                    }
                }
                None => next.push(d),
            }
            if next.len() > limit {
                return Err(FootprintError::ExpansionOverflow { limit });
            }
        }
        current = next;
        if !changed {
            break;
        }
    }
    Ok(current)
}

/// First expandable entry of `d`, with the values it expands to.
fn split_first(d: &Attributes) -> Result<Option<(String, Vec<Value>)>> {
    for (key, value) in d {
        match value {
            Value::List(items) => {
                tracing::debug!(key = key.as_str(), count = items.len(), "list expansion");
                return Ok(Some((key.clone(), items.clone())));
            }
            Value::Str(s) => {
                if let Some(caps) = regex!(r"(?i)^range\((\d+)(?:,(\d+))?(?:,(\d+))?\)$").captures(s) {
                    tracing::debug!(key = key.as_str(), value = s.as_str(), "range expansion");
                    let number = |idx: usize| -> Result<Option<i64>> {
                        caps.get(idx)
                            .map(|m| m.as_str().parse::<i64>().map_err(|_| FootprintError::InvalidRange(s.clone())))
                            .transpose()
                    };
                    let start = number(1)?.unwrap_or_default();
                    let end = number(2)?.unwrap_or(start);
                    let step = number(3)?.unwrap_or(1);
                    let items = end
                        .checked_add(1)
                        .and_then(|stop| stepped(start, stop, step))
                        .ok_or_else(|| FootprintError::InvalidRange(s.clone()))?;
                    return Ok(Some((key.clone(), items.into_iter().map(Value::Int).collect())));
                }
                if s.contains(',') {
                    tracing::debug!(key = key.as_str(), value = s.as_str(), "comma separated expansion");
                    let items = s.split(',').map(Value::from).collect();
                    return Ok(Some((key.clone(), items)));
                }
            }
            _ => {}
        }
    }
    Ok(None)
}

/// Half open range from `start` towards `end`; `None` on a zero step.
fn stepped(start: i64, end: i64, step: i64) -> Option<Vec<i64>> {
    if step == 0 {
        return None;
    }
    let mut out = Vec::new();
    let mut x = start;
    while (step > 0 && x < end) || (step < 0 && x > end) {
        out.push(x);
        x = x.checked_add(step)?;
    }
    Some(out)
}

/// Extended range expansion.
///
/// `start` is a comma separated list of `a`, `a-b` or `a-b-step` pieces, each
/// optionally prefixed by `name_`. `end` and `step` only apply to pieces that
/// do not carry their own. Ends are inclusive and `shift` offsets every value.
/// Plain integers come first, sorted and deduplicated, followed by the
/// prefixed strings in the same manner.
///
/// ```
/// use footprints::{util::rangex, Value};
///
/// let hours = rangex("0-12-6,18", None, None, None).unwrap();
/// assert_eq!(hours, [0, 6, 12, 18].map(Value::Int));
/// ```
pub fn rangex(start: &str, end: Option<i64>, step: Option<i64>, shift: Option<i64>) -> Result<Vec<Value>> {
    let mut ints = Vec::new();
    let mut prefixed = Vec::new();

    for piece in start.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let invalid = || FootprintError::InvalidRange(piece.to_string());
        let (prefix, body) = match piece.split_once('_') {
            Some((prefix, body)) => (Some(prefix), body),
            None => (None, piece),
        };
        let bounds: Vec<&str> = if body.starts_with('-') { vec![body] } else { body.split('-').collect() };
        if bounds.len() > 3 {
            return Err(invalid());
        }
        let parse = |s: &str| s.trim().parse::<i64>().map_err(|_| invalid());

        let first = parse(bounds[0])?;
        let last = match bounds.get(1) {
            Some(b) => parse(b)?,
            None => end.unwrap_or(first),
        };
        let step = match bounds.get(2) {
            Some(b) => parse(b)?,
            None => step.unwrap_or(1),
        };
        let offset = shift.unwrap_or(0);
        let stop = if step < 0 { last.checked_sub(1) } else { last.checked_add(1) };
        let values = stop
            .zip(first.checked_add(offset))
            .and_then(|(stop, first)| stepped(first, stop.checked_add(offset)?, step))
            .ok_or_else(invalid)?;

        match prefix {
            Some(prefix) => prefixed.extend(values.into_iter().map(|v| format!("{prefix}_{v}"))),
            None => ints.extend(values),
        }
    }

    ints.sort_unstable();
    ints.dedup();
    prefixed.sort();
    prefixed.dedup();
    Ok(ints.into_iter().map(Value::Int).chain(prefixed.into_iter().map(Value::Str)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::desc;

    fn ints(values: &[i64]) -> Vec<Value> {
        values.iter().copied().map(Value::Int).collect()
    }

    #[test]
    fn plain_description_is_kept() {
        let d = desc! { "test" => "alpha" };
        assert_eq!(expand(&d).unwrap(), vec![d]);
    }

    #[test]
    fn lists_and_commas_expand_in_order() {
        let out = expand(&desc! { "test" => "alpha", "niv2" => vec!["a", "b"], "geo" => "x,y" }).unwrap();
        let pairs: Vec<String> = out.iter().map(|d| format!("{}{}", d["niv2"], d["geo"])).collect();
        assert_eq!(pairs, vec!["ax", "ay", "bx", "by"]);
        assert!(out.iter().all(|d| d["test"] == Value::from("alpha")));
        assert_eq!(out[0].keys().collect::<Vec<_>>(), vec!["test", "niv2", "geo"]);
    }

    #[test]
    fn range_strings_are_inclusive() {
        let out = expand(&desc! { "term" => "RANGE(3)" }).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0]["term"], Value::Int(3));

        let out = expand(&desc! { "term" => "range(1,7,3)" }).unwrap();
        assert_eq!(out.iter().map(|d| d["term"].clone()).collect::<Vec<_>>(), ints(&[1, 4, 7]));
    }

    #[test]
    fn zero_step_range_is_an_error() {
        let err = expand(&desc! { "term" => "range(1,7,0)" }).unwrap_err();
        assert!(matches!(err, FootprintError::InvalidRange(_)));
    }

    #[test]
    fn empty_list_yields_nothing() {
        assert!(expand(&desc! { "niv" => Vec::<i64>::new() }).unwrap().is_empty());
    }

    #[test]
    fn overflow_is_reported() {
        let d = desc! { "a" => "range(1,10)", "b" => "range(1,10)" };
        assert_eq!(expand(&d).unwrap().len(), 100);
        let err = expand_with_limit(&d, 50).unwrap_err();
        assert!(matches!(err, FootprintError::ExpansionOverflow { limit: 50 }));
    }

    #[test]
    fn rangex_pieces() {
        assert_eq!(rangex("2", None, None, None).unwrap(), ints(&[2]));
        assert_eq!(rangex("1-5-2", None, None, None).unwrap(), ints(&[1, 3, 5]));
        assert_eq!(rangex("0-12-6,18,6", None, None, None).unwrap(), ints(&[0, 6, 12, 18]));
        assert_eq!(rangex("0", Some(6), Some(3), None).unwrap(), ints(&[0, 3, 6]));
        assert_eq!(rangex("5", Some(1), Some(-2), None).unwrap(), ints(&[1, 3, 5]));
        assert_eq!(rangex("0-6-3", None, None, Some(1)).unwrap(), ints(&[1, 4, 7]));
        assert_eq!(rangex("-3", None, None, None).unwrap(), ints(&[-3]));
    }

    #[test]
    fn rangex_prefixes_sort_after_integers() {
        let out = rangex("fc_1-2,0", None, None, None).unwrap();
        assert_eq!(out, vec![Value::Int(0), Value::from("fc_1"), Value::from("fc_2")]);
    }

    #[test]
    fn rangex_rejects_garbage() {
        assert!(matches!(rangex("a-b", None, None, None), Err(FootprintError::InvalidRange(_))));
        assert!(matches!(rangex("1-2-0", None, None, None), Err(FootprintError::InvalidRange(_))));
        assert!(matches!(rangex("1-2-3-4", None, None, None), Err(FootprintError::InvalidRange(_))));
    }
}
