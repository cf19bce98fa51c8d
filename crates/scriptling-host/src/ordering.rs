//! Dependency ordering for the entry pass.

use std::collections::HashMap;

use crate::error::LoadError;
use crate::metadata::ModuleMetadata;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

/// Result of ordering a set of modules by their `requires`
#[derive(Debug, Default)]
pub struct LoadOrder {
    /// Indices into the input, dependencies first
    pub order: Vec<usize>,
    /// Modules that cannot be loaded at all
    pub rejected: Vec<(usize, LoadError)>,
}

/// Order modules so each one comes after everything it requires.
///
/// Names are compared case-insensitively. Modules in a cycle, or requiring a
/// module that is not in the set, are rejected. Modules that depend on a
/// rejected module stay in the order; the entry pass fails them when it sees
/// the dependency missing.
pub fn load_order(modules: &[ModuleMetadata]) -> LoadOrder {
    let by_name: HashMap<String, usize> = modules
        .iter()
        .enumerate()
        .rev()
        .map(|(i, m)| (m.name.to_lowercase(), i))
        .collect();

    let mut sorter = Sorter {
        modules,
        by_name: &by_name,
        marks: vec![None; modules.len()],
        stack: Vec::new(),
        rejected: vec![None; modules.len()],
        order: Vec::new(),
    };

    for i in 0..modules.len() {
        sorter.visit(i);
    }

    let rejected = sorter
        .rejected
        .into_iter()
        .enumerate()
        .filter_map(|(i, e)| e.map(|e| (i, e)))
        .collect();

    LoadOrder {
        order: sorter.order,
        rejected,
    }
}

struct Sorter<'a> {
    modules: &'a [ModuleMetadata],
    by_name: &'a HashMap<String, usize>,
    marks: Vec<Option<Mark>>,
    stack: Vec<usize>,
    rejected: Vec<Option<LoadError>>,
    order: Vec<usize>,
}

impl Sorter<'_> {
    fn visit(&mut self, i: usize) {
        if self.marks[i].is_some() {
            return;
        }
        self.marks[i] = Some(Mark::Visiting);
        self.stack.push(i);

        let modules = self.modules;
        let name = modules[i].name.clone();
        for dependency in &modules[i].requires {
            let Some(&dep) = self.by_name.get(&dependency.to_lowercase()) else {
                self.reject(
                    i,
                    LoadError::MissingDependency {
                        name: name.clone(),
                        dependency: dependency.clone(),
                    },
                );
                continue;
            };

            match self.marks[dep] {
                None => self.visit(dep),
                Some(Mark::Visiting) => self.reject_cycle(dep),
                Some(Mark::Done) => {}
            }
        }

        self.stack.pop();
        self.marks[i] = Some(Mark::Done);
        if self.rejected[i].is_none() {
            self.order.push(i);
        }
    }

    fn reject_cycle(&mut self, start: usize) {
        let Some(pos) = self.stack.iter().position(|&j| j == start) else {
            return;
        };
        let members: Vec<usize> = self.stack[pos..].to_vec();
        let mut cycle: Vec<String> = members
            .iter()
            .map(|&j| self.modules[j].name.clone())
            .collect();
        cycle.push(self.modules[start].name.clone());

        for j in members {
            self.reject(
                j,
                LoadError::DependencyCycle {
                    name: self.modules[j].name.clone(),
                    cycle: cycle.clone(),
                },
            );
        }
    }

    fn reject(&mut self, i: usize, error: LoadError) {
        if self.rejected[i].is_none() {
            self.rejected[i] = Some(error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(name: &str, requires: &[&str]) -> ModuleMetadata {
        let mut m = ModuleMetadata::new(name);
        m.requires = requires.iter().map(|s| s.to_string()).collect();
        m
    }

    fn names(modules: &[ModuleMetadata], order: &[usize]) -> Vec<String> {
        order.iter().map(|&i| modules[i].name.clone()).collect()
    }

    #[test]
    fn test_dependencies_come_first() {
        let modules = vec![
            meta("app", &["ui", "net"]),
            meta("ui", &["core"]),
            meta("net", &["Core"]),
            meta("core", &[]),
        ];
        let result = load_order(&modules);
        assert!(result.rejected.is_empty());
        assert_eq!(names(&modules, &result.order), vec!["core", "ui", "net", "app"]);
    }

    #[test]
    fn test_independent_modules_keep_input_order() {
        let modules = vec![meta("b", &[]), meta("a", &[]), meta("c", &[])];
        let result = load_order(&modules);
        assert_eq!(names(&modules, &result.order), vec!["b", "a", "c"]);
    }

    #[test]
    fn test_cycle_rejects_members_only() {
        let modules = vec![
            meta("a", &["b"]),
            meta("b", &["a"]),
            meta("c", &[]),
            meta("d", &["a"]),
        ];
        let result = load_order(&modules);

        let rejected: Vec<usize> = result.rejected.iter().map(|(i, _)| *i).collect();
        assert_eq!(rejected, vec![0, 1]);
        assert!(matches!(result.rejected[0].1, LoadError::DependencyCycle { .. }));
        assert_eq!(names(&modules, &result.order), vec!["c", "d"]);
    }

    #[test]
    fn test_missing_dependency() {
        let modules = vec![meta("a", &["ghost"]), meta("b", &[])];
        let result = load_order(&modules);
        assert_eq!(result.rejected.len(), 1);
        assert_eq!(
            result.rejected[0].1,
            LoadError::MissingDependency {
                name: "a".into(),
                dependency: "ghost".into()
            }
        );
        assert_eq!(names(&modules, &result.order), vec!["b"]);
    }
}
