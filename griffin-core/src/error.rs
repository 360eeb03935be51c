//! 容器错误类型
//!
//! 容器内部统一使用 [`BeansError`]，用户回调（构造器、setter、init 方法）返回
//! `anyhow::Result`，在边界处被包装进 `BeansError::Other` 或作为 cause 挂到
//! `BeanCreation` 上。

use std::error::Error as StdError;

use thiserror::Error;

/// 任意可跨线程传递的错误原因
pub type Cause = Box<dyn StdError + Send + Sync + 'static>;

/// 容器结果类型
pub type BeansResult<T> = std::result::Result<T, BeansError>;

/// Bean 容器错误
#[derive(Debug, Error)]
pub enum BeansError {
    #[error("No bean named '{name}' available")]
    NoSuchBeanDefinition { name: String },

    #[error("No qualifying bean of type '{required_type}' available: {message}")]
    NoQualifyingBean {
        required_type: String,
        message: String,
    },

    #[error(
        "No qualifying bean of type '{required_type}' available: expected single matching bean but found {}: {}",
        .candidates.len(),
        .candidates.join(",")
    )]
    NoUniqueBeanDefinition {
        required_type: String,
        candidates: Vec<String>,
    },

    #[error("Error creating bean with name '{bean_name}': {message}")]
    BeanCreation {
        bean_name: String,
        message: String,
        #[source]
        source: Option<Cause>,
    },

    #[error(
        "Error creating bean with name '{bean_name}': Unsatisfied dependency expressed through {injection_point}: {message}"
    )]
    UnsatisfiedDependency {
        bean_name: String,
        injection_point: String,
        message: String,
        #[source]
        source: Option<Box<BeansError>>,
        suppressed: Vec<BeansError>,
    },

    #[error(
        "Error creating bean with name '{bean_name}': Ambiguous {kind} matches found in bean '{bean_name}' (hint: specify index/type/name arguments for simple parameters to avoid type ambiguities): {}",
        .candidates.join(", ")
    )]
    AmbiguousResolution {
        bean_name: String,
        kind: String,
        candidates: Vec<String>,
    },

    #[error("Error creating bean with name '{bean_name}': {message}")]
    NoMatchingCandidate { bean_name: String, message: String },

    #[error(
        "Error creating bean with name '{bean_name}': Bean with name '{bean_name}' has been injected into other beans [{}] in its raw version as part of a circular reference, but has eventually been wrapped. This means that said other beans do not use the final version of the bean.",
        .dependents.join(",")
    )]
    UnresolvableCircularReference {
        bean_name: String,
        dependents: Vec<String>,
    },

    #[error(
        "Error creating bean with name '{bean_name}': Requested bean is currently in creation: Is there an unresolvable circular reference?"
    )]
    CurrentlyInCreation { bean_name: String },

    #[error("Error creating bean with name '{bean_name}': Circular depends-on relationship between '{bean_name}' and '{dependency}'")]
    DependsOnCycle { bean_name: String, dependency: String },

    #[error("Error creating bean with name '{bean_name}': Scope '{scope}' is not active for the current thread")]
    ScopeInactive {
        bean_name: String,
        scope: String,
        #[source]
        source: Option<Cause>,
    },

    #[error("No scope registered for scope name '{scope}'")]
    NoSuchScope { scope: String },

    #[error("Invalid bean definition with name '{bean_name}': {message}")]
    BeanDefinitionStore { bean_name: String, message: String },

    #[error("Bean named '{bean_name}' is expected to be a factory bean but is of type '{actual_type}'")]
    BeanIsNotAFactory {
        bean_name: String,
        actual_type: String,
    },

    #[error("Failed to convert value of type '{actual_type}' to required type '{required_type}': {message}")]
    TypeMismatch {
        actual_type: String,
        required_type: String,
        message: String,
    },

    #[error(
        "Invalid property '{property}' of bean class [{class_name}]: Bean property '{property}' is not writable or has an invalid setter method"
    )]
    NotWritableProperty { class_name: String, property: String },

    #[error("{0}")]
    IllegalState(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl BeansError {
    pub fn creation(bean_name: impl Into<String>, message: impl Into<String>) -> Self {
        BeansError::BeanCreation {
            bean_name: bean_name.into(),
            message: message.into(),
            source: None,
        }
    }

    pub fn creation_caused_by(
        bean_name: impl Into<String>,
        message: impl Into<String>,
        cause: impl Into<Cause>,
    ) -> Self {
        BeansError::BeanCreation {
            bean_name: bean_name.into(),
            message: message.into(),
            source: Some(cause.into()),
        }
    }

    pub fn no_such_bean(name: impl Into<String>) -> Self {
        BeansError::NoSuchBeanDefinition { name: name.into() }
    }

    pub fn illegal_state(message: impl Into<String>) -> Self {
        BeansError::IllegalState(message.into())
    }

    /// 错误关联的 bean 名称（如果有）
    pub fn bean_name(&self) -> Option<&str> {
        match self {
            BeansError::NoSuchBeanDefinition { name } => Some(name),
            BeansError::BeanCreation { bean_name, .. }
            | BeansError::UnsatisfiedDependency { bean_name, .. }
            | BeansError::AmbiguousResolution { bean_name, .. }
            | BeansError::NoMatchingCandidate { bean_name, .. }
            | BeansError::UnresolvableCircularReference { bean_name, .. }
            | BeansError::CurrentlyInCreation { bean_name }
            | BeansError::DependsOnCycle { bean_name, .. }
            | BeansError::ScopeInactive { bean_name, .. }
            | BeansError::BeanDefinitionStore { bean_name, .. }
            | BeansError::BeanIsNotAFactory { bean_name, .. } => Some(bean_name),
            _ => None,
        }
    }

    /// 依次遍历自身以及整条 cause 链
    pub fn causes<'a>(&'a self) -> impl Iterator<Item = &'a (dyn StdError + 'static)> + 'a {
        std::iter::successors(Some(self as &'a (dyn StdError + 'static)), |e: &&'a (dyn StdError + 'static)| {
            (*e).source()
        })
    }

    /// 在 cause 链中查找第一个满足条件的 `BeansError`
    pub fn find(&self, predicate: impl Fn(&BeansError) -> bool) -> Option<&BeansError> {
        self.causes().find_map(|cause| {
            let found = cause.downcast_ref::<BeansError>().or_else(|| {
                cause
                    .downcast_ref::<Box<BeansError>>()
                    .map(|boxed| boxed.as_ref())
            });
            found.filter(|e| predicate(e))
        })
    }

    /// cause 链中最深处的 `BeansError`
    pub fn most_specific(&self) -> &BeansError {
        self.causes()
            .filter_map(|cause| cause.downcast_ref::<BeansError>())
            .last()
            .unwrap_or(self)
    }

    pub fn is_currently_in_creation(&self) -> bool {
        self.find(|e| matches!(e, BeansError::CurrentlyInCreation { .. }))
            .is_some()
    }

    pub(crate) fn is_no_such_bean(&self) -> bool {
        matches!(
            self,
            BeansError::NoSuchBeanDefinition { .. } | BeansError::NoQualifyingBean { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_walks_cause_chain() {
        let inner = BeansError::CurrentlyInCreation {
            bean_name: "a".to_string(),
        };
        let outer = BeansError::creation_caused_by("b", "Cannot resolve reference to bean 'a'", inner);

        assert_eq!(outer.bean_name(), Some("b"));
        assert!(outer.is_currently_in_creation());
        assert_eq!(outer.most_specific().bean_name(), Some("a"));
        assert_eq!(outer.causes().count(), 2);
    }

    #[test]
    fn test_display_messages() {
        let err = BeansError::NoUniqueBeanDefinition {
            required_type: "Repository".to_string(),
            candidates: vec!["a".to_string(), "b".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "No qualifying bean of type 'Repository' available: expected single matching bean but found 2: a,b"
        );

        let err = BeansError::UnresolvableCircularReference {
            bean_name: "a".to_string(),
            dependents: vec!["b".to_string()],
        };
        assert!(err.to_string().contains("[b]"));
    }

    #[test]
    fn test_anyhow_is_transparent() {
        let err: BeansError = anyhow::anyhow!("boom").into();
        assert_eq!(err.to_string(), "boom");
        assert!(err.bean_name().is_none());
    }
}
