//! 容器内部使用的工具函数

/// Bean 命名
pub mod naming {
    use crate::constants::GENERATED_BEAN_NAME_SEPARATOR;

    /// 将类型名转为 bean 名称的默认形式
    ///
    /// ```
    /// use griffin_core::utils::naming::to_camel_case;
    ///
    /// assert_eq!(to_camel_case("UserService"), "userService");
    /// assert_eq!(to_camel_case("A"), "a");
    /// assert_eq!(to_camel_case(""), "");
    /// ```
    pub fn to_camel_case(s: &str) -> String {
        let mut chars = s.chars();
        match chars.next() {
            None => String::new(),
            Some(first) => {
                let mut result = String::with_capacity(s.len());
                result.extend(first.to_lowercase());
                result.push_str(chars.as_str());
                result
            }
        }
    }

    /// 根据类名生成 bean 名称，带路径的类名只取最后一段
    ///
    /// ```
    /// use griffin_core::utils::naming::bean_name_for_class;
    ///
    /// assert_eq!(bean_name_for_class("app::service::OrderService"), "orderService");
    /// ```
    pub fn bean_name_for_class(class_name: &str) -> String {
        let short = class_name.rsplit("::").next().unwrap_or(class_name);
        to_camel_case(short)
    }

    /// 内部 bean 的唯一名称
    pub fn inner_bean_name(name: &str, sequence: usize) -> String {
        format!("{}{}{}", name, GENERATED_BEAN_NAME_SEPARATOR, sequence)
    }

    /// 去掉内部 bean 名称的唯一后缀
    pub fn original_inner_bean_name(name: &str) -> &str {
        name.split(GENERATED_BEAN_NAME_SEPARATOR).next().unwrap_or(name)
    }
}

/// 依赖关系工具
pub mod dependency {
    use std::cell::RefCell;
    use std::collections::{HashMap, HashSet};
    use std::sync::atomic::{AtomicUsize, Ordering};

    use thiserror::Error;

    static NEXT_TRACKER_ID: AtomicUsize = AtomicUsize::new(0);

    thread_local! {
        static IN_CREATION: RefCell<HashSet<(usize, String)>> = RefCell::new(HashSet::new());
    }

    /// 记录当前线程正在创建的非单例 bean
    ///
    /// 每个工厂持有一个追踪器，不同工厂之间互不影响。同一线程再次请求正在
    /// 创建的原型 bean 即为无法解决的循环引用。
    #[derive(Debug)]
    pub struct CreationTracker {
        id: usize,
    }

    impl CreationTracker {
        pub fn new() -> Self {
            Self {
                id: NEXT_TRACKER_ID.fetch_add(1, Ordering::Relaxed),
            }
        }

        /// 当前线程是否正在创建该 bean
        pub fn is_creating(&self, name: &str) -> bool {
            IN_CREATION.with(|set| set.borrow().contains(&(self.id, name.to_string())))
        }

        /// 标记开始创建，守卫释放时清除标记
        pub fn start_creating(&self, name: &str) -> CreationGuard<'_> {
            IN_CREATION.with(|set| set.borrow_mut().insert((self.id, name.to_string())));
            CreationGuard {
                tracker: self,
                name: name.to_string(),
            }
        }

        /// 当前线程正在创建的 bean
        pub fn current_creating(&self) -> Vec<String> {
            IN_CREATION.with(|set| {
                set.borrow()
                    .iter()
                    .filter(|(id, _)| *id == self.id)
                    .map(|(_, name)| name.clone())
                    .collect()
            })
        }
    }

    impl Default for CreationTracker {
        fn default() -> Self {
            Self::new()
        }
    }

    /// 创建结束时清除标记
    pub struct CreationGuard<'a> {
        tracker: &'a CreationTracker,
        name: String,
    }

    impl Drop for CreationGuard<'_> {
        fn drop(&mut self) {
            let key = (self.tracker.id, std::mem::take(&mut self.name));
            IN_CREATION.with(|set| set.borrow_mut().remove(&key));
        }
    }

    /// 依赖图检查结果
    #[derive(Debug, Error, PartialEq, Eq)]
    pub enum DependencyValidationError {
        #[error("Circular dependency detected: {}", .cycle.join(" -> "))]
        CircularDependency { cycle: Vec<String> },

        #[error("Bean '{bean}' depends on '{missing}' which is not registered")]
        MissingDependency { bean: String, missing: String },
    }

    /// 检查依赖图中缺失的节点和环
    ///
    /// `dependencies` 为 bean 名称到其依赖列表的映射，按名称排序遍历，
    /// 返回第一个发现的问题。
    pub fn validate_dependency_graph(
        dependencies: &HashMap<String, Vec<String>>,
    ) -> Result<(), DependencyValidationError> {
        let mut names: Vec<&String> = dependencies.keys().collect();
        names.sort();

        for bean_name in &names {
            for dep in &dependencies[*bean_name] {
                if !dependencies.contains_key(dep) {
                    return Err(DependencyValidationError::MissingDependency {
                        bean: (*bean_name).clone(),
                        missing: dep.clone(),
                    });
                }
            }
        }

        let mut visited = HashSet::new();
        let mut stack = Vec::new();
        for bean_name in names {
            if !visited.contains(bean_name.as_str()) {
                if let Some(cycle) = detect_cycle(bean_name, dependencies, &mut visited, &mut stack) {
                    return Err(DependencyValidationError::CircularDependency { cycle });
                }
            }
        }
        Ok(())
    }

    fn detect_cycle(
        node: &str,
        graph: &HashMap<String, Vec<String>>,
        visited: &mut HashSet<String>,
        stack: &mut Vec<String>,
    ) -> Option<Vec<String>> {
        visited.insert(node.to_string());
        stack.push(node.to_string());

        if let Some(deps) = graph.get(node) {
            for dep in deps {
                if let Some(start) = stack.iter().position(|x| x == dep) {
                    let mut cycle = stack[start..].to_vec();
                    cycle.push(dep.clone());
                    return Some(cycle);
                }
                if !visited.contains(dep) {
                    if let Some(cycle) = detect_cycle(dep, graph, visited, stack) {
                        return Some(cycle);
                    }
                }
            }
        }

        stack.pop();
        None
    }
}

#[cfg(test)]
mod tests {
    mod naming_tests {
        use super::super::naming::*;

        #[test]
        fn test_to_camel_case() {
            assert_eq!(to_camel_case("UserService"), "userService");
            assert_eq!(to_camel_case("AB"), "aB");
            assert_eq!(to_camel_case("lowerCase"), "lowerCase");
        }

        #[test]
        fn test_inner_bean_names() {
            let name = inner_bean_name("dataSource", 3);
            assert_eq!(name, "dataSource#3");
            assert_eq!(original_inner_bean_name(&name), "dataSource");
        }
    }

    mod dependency_tests {
        use super::super::dependency::*;
        use std::collections::HashMap;

        #[test]
        fn test_creation_tracker_guard() {
            let tracker = CreationTracker::new();
            assert!(!tracker.is_creating("serviceA"));

            {
                let _guard = tracker.start_creating("serviceA");
                assert!(tracker.is_creating("serviceA"));
                assert_eq!(tracker.current_creating(), vec!["serviceA".to_string()]);
            }
            assert!(!tracker.is_creating("serviceA"));
        }

        #[test]
        fn test_trackers_are_independent() {
            let a = CreationTracker::new();
            let b = CreationTracker::new();
            let _guard = a.start_creating("bean");
            assert!(a.is_creating("bean"));
            assert!(!b.is_creating("bean"));
        }

        #[test]
        fn test_tracker_is_per_thread() {
            let tracker = std::sync::Arc::new(CreationTracker::new());
            let _guard = tracker.start_creating("bean");
            let other = std::sync::Arc::clone(&tracker);
            let seen = std::thread::spawn(move || other.is_creating("bean")).join().unwrap();
            assert!(!seen);
        }

        #[test]
        fn test_validate_missing_dependency() {
            let mut deps = HashMap::new();
            deps.insert("a".to_string(), vec!["missing".to_string()]);
            assert_eq!(
                validate_dependency_graph(&deps),
                Err(DependencyValidationError::MissingDependency {
                    bean: "a".to_string(),
                    missing: "missing".to_string(),
                })
            );
        }

        #[test]
        fn test_validate_cycle() {
            let mut deps = HashMap::new();
            deps.insert("a".to_string(), vec!["b".to_string()]);
            deps.insert("b".to_string(), vec!["a".to_string()]);
            deps.insert("c".to_string(), vec![]);

            match validate_dependency_graph(&deps) {
                Err(DependencyValidationError::CircularDependency { cycle }) => {
                    assert_eq!(cycle, vec!["a", "b", "a"]);
                }
                other => panic!("unexpected result: {:?}", other),
            }
        }

        #[test]
        fn test_validate_ok() {
            let mut deps = HashMap::new();
            deps.insert("a".to_string(), vec!["b".to_string()]);
            deps.insert("b".to_string(), vec![]);
            assert!(validate_dependency_graph(&deps).is_ok());
        }
    }
}
