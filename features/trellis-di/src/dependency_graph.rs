use std::collections::{BTreeMap, HashMap, HashSet};

use thiserror::Error;

use crate::{
    injector::{read, Injector},
    provider::{ParentProvider, Provider},
    token::Token,
};

/// Graph of the registered providers of a container.
/// Used to check missing and circular dependencies before anything is
/// constructed.
pub struct DependencyGraph {
    order: BTreeMap<usize, Token>,
    map: HashMap<Token, DependencyGraphEntry>,
}

impl DependencyGraph {
    pub fn new(injector: &Injector) -> Self {
        let mut graph = Self {
            order: BTreeMap::new(),
            map: HashMap::new(),
        };

        for (token, provider) in injector.entries() {
            let dependencies = read(&provider)
                .dependencies()
                .into_iter()
                .filter(|dependency| !is_sentinel(dependency))
                .collect();
            graph.add(token, dependencies);
        }

        graph
    }

    fn add(&mut self, token: Token, dependencies: Vec<Token>) {
        self.order.insert(self.order.len(), token.clone());
        self.map.insert(
            token.clone(),
            DependencyGraphEntry {
                token,
                dependencies,
            },
        );
    }

    pub fn dependencies_of(&self, token: &Token) -> Option<&[Token]> {
        self.map
            .get(token)
            .map(|entry| entry.dependencies.as_slice())
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Validate the graph
    ///
    /// Returns a list of all issues
    pub fn check(&self) -> Result<(), DependencyGraphErrors> {
        let mut checked = HashSet::new();
        let mut errors = Vec::new();
        for token in self.order.values() {
            let Some(entry) = self.map.get(token) else {
                continue;
            };
            let mut dependency_chain = Vec::new();
            check_recurse(
                self,
                &mut checked,
                &mut errors,
                &mut dependency_chain,
                entry,
            );
        }

        if !errors.is_empty() {
            return Err(DependencyGraphErrors { errors });
        }

        return Ok(());

        fn check_recurse<'a>(
            graph: &'a DependencyGraph,
            checked: &mut HashSet<&'a Token>,
            errors: &mut Vec<DependencyGraphError>,
            dependency_chain: &mut Vec<&'a Token>,
            entry: &'a DependencyGraphEntry,
        ) {
            // Circular Dependency Check
            if let Some(start) = dependency_chain.iter().position(|token| *token == &entry.token) {
                let chain: Vec<Token> = dependency_chain[start..]
                    .iter()
                    .map(|token| (*token).clone())
                    .chain([entry.token.clone()])
                    .collect();

                errors.push(DependencyGraphError::CircularDependency {
                    from: dependency_chain[start].clone(),
                    to: dependency_chain[dependency_chain.len() - 1].clone(),
                    chain,
                });
                return;
            }

            // Skip other checks if already checked
            if !checked.insert(&entry.token) {
                return;
            };

            dependency_chain.push(&entry.token);

            for dependency in &entry.dependencies {
                let Some(next_entry) = graph.map.get(dependency) else {
                    errors.push(DependencyGraphError::MissingDependency {
                        dependency: dependency.clone(),
                        required_by: entry.token.clone(),
                    });
                    continue;
                };

                check_recurse(graph, checked, errors, dependency_chain, next_entry);
            }

            dependency_chain.pop();
        }
    }
}

fn is_sentinel(token: &Token) -> bool {
    *token == Token::of::<Provider>()
        || *token == Token::of::<ParentProvider>()
        || *token == Token::of::<Injector>()
}

struct DependencyGraphEntry {
    token: Token,
    dependencies: Vec<Token>,
}

#[derive(Error, Debug, Clone)]
pub enum DependencyGraphError {
    #[error("'{required_by}' needs '{dependency}' but it is missing")]
    MissingDependency { dependency: Token, required_by: Token },
    #[error("A Circular Dependency exists between '{from}' and '{to}' through {chain:?} - Consider an injected property")]
    CircularDependency {
        from: Token,
        to: Token,
        chain: Vec<Token>,
    },
}

impl DependencyGraphError {
    pub fn is_missing(&self) -> bool {
        matches!(self, DependencyGraphError::MissingDependency { .. })
    }
}

impl std::fmt::Display for DependencyGraphErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut display = Vec::new();
        display.push("The dependency graph had one or more errors:".to_string());
        for error in &self.errors {
            display.push(format!("- {}", error));
        }
        f.write_str(&display.join("\n"))
    }
}

#[derive(Error, Debug, Clone)]
pub struct DependencyGraphErrors {
    pub errors: Vec<DependencyGraphError>,
}
