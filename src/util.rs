use std::hash::Hash;
use std::collections::HashSet;

use rand::{
    distributions::Alphanumeric,
    Rng,
    thread_rng,
};

pub fn first_duplicate<A>(iter: impl Iterator<Item=A>) -> Option<A>
where A: Eq + Hash {
    let mut set = HashSet::<A>::new();
    for a in iter {
        let old = set.replace(a);
        if let Some(old) = old {
            return Some(old);
        }
    }
    None
}

/// Elements of `items` whose key does not appear in `keys`, in their original order.
pub fn not_in<'a, T, K, F>(items: &'a [T], keys: &HashSet<K>, key: F) -> Vec<&'a T>
where K: Eq + Hash, F: Fn(&'a T) -> K {
    items.iter()
        .filter(|item| !keys.contains(&key(*item)))
        .collect()
}

pub fn random_token(len: usize) -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .collect()
}
