//! 定义中的值：构造参数、属性值以及它们引用的字面量、bean 引用和内部 bean

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use crate::class::BeanClass;
use crate::definition::{BeanDefinition, BeanDefinitionHolder};
use crate::object::BeanObject;

/// 带可选目标类型的字符串字面量
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypedStringValue {
    pub value: String,
    pub target_type: Option<String>,
}

/// 对另一个 bean 的运行时引用
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BeanReference {
    pub bean_name: String,
    pub to_parent: bool,
}

/// 定义中尚未解析的值
#[derive(Clone, PartialEq)]
pub enum BeanValue {
    Null,
    Literal(TypedStringValue),
    /// 已经是运行时对象
    Object(BeanObject),
    Reference(BeanReference),
    /// 解析为 bean 名称字符串，解析时校验该 bean 存在
    BeanName(String),
    Inner(Box<BeanDefinitionHolder>),
    List(Vec<BeanValue>),
}

impl BeanValue {
    pub fn literal(value: impl Into<String>) -> Self {
        BeanValue::Literal(TypedStringValue {
            value: value.into(),
            target_type: None,
        })
    }

    pub fn typed_literal(value: impl Into<String>, target_type: impl Into<String>) -> Self {
        BeanValue::Literal(TypedStringValue {
            value: value.into(),
            target_type: Some(target_type.into()),
        })
    }

    pub fn reference(bean_name: impl Into<String>) -> Self {
        BeanValue::Reference(BeanReference {
            bean_name: bean_name.into(),
            to_parent: false,
        })
    }

    pub fn parent_reference(bean_name: impl Into<String>) -> Self {
        BeanValue::Reference(BeanReference {
            bean_name: bean_name.into(),
            to_parent: true,
        })
    }

    pub fn object(value: BeanObject) -> Self {
        BeanValue::Object(value)
    }

    pub fn inner(bean_name: impl Into<String>, definition: BeanDefinition) -> Self {
        BeanValue::Inner(Box::new(BeanDefinitionHolder::new(bean_name, definition)))
    }

    pub fn list(items: Vec<BeanValue>) -> Self {
        BeanValue::List(items)
    }

    /// 已解析的运行时值
    pub fn as_object(&self) -> Option<&BeanObject> {
        match self {
            BeanValue::Object(o) => Some(o),
            _ => None,
        }
    }

    /// 解析为不可变对象，转换结果可以缓存
    pub(crate) fn is_cacheable_literal(&self) -> bool {
        matches!(self, BeanValue::Literal(_))
    }

    /// 值在赋值给 `required` 时不需要先解析或转换
    fn is_assignable_to(&self, required: &BeanClass) -> bool {
        match self {
            BeanValue::Null => !required.is_primitive(),
            BeanValue::Object(o) => required.is_instance(o),
            _ => required.is_object(),
        }
    }
}

impl fmt::Debug for BeanValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BeanValue::Null => f.write_str("null"),
            BeanValue::Literal(t) => write!(f, "{:?}", t.value),
            BeanValue::Object(o) => write!(f, "{:?}", o),
            BeanValue::Reference(r) => write!(f, "<{}>", r.bean_name),
            BeanValue::BeanName(n) => write!(f, "idref '{}'", n),
            BeanValue::Inner(h) => write!(f, "Inner bean '{}'", h.bean_name),
            BeanValue::List(items) => f.debug_list().entries(items).finish(),
        }
    }
}

/// 单个构造参数：值加上可选的类型名和参数名
#[derive(Debug, Clone, PartialEq)]
pub struct ValueHolder {
    pub value: BeanValue,
    pub type_name: Option<String>,
    pub name: Option<String>,
}

impl ValueHolder {
    pub fn new(value: BeanValue) -> Self {
        Self {
            value,
            type_name: None,
            name: None,
        }
    }

    pub fn typed(value: BeanValue, type_name: impl Into<String>) -> Self {
        Self {
            value,
            type_name: Some(type_name.into()),
            name: None,
        }
    }

    pub fn named(value: BeanValue, name: impl Into<String>) -> Self {
        Self {
            value,
            type_name: None,
            name: Some(name.into()),
        }
    }

    pub fn with_value(&self, value: BeanValue) -> Self {
        Self {
            value,
            type_name: self.type_name.clone(),
            name: self.name.clone(),
        }
    }
}

/// 构造参数在参数集中的位置，用于避免同一个泛型值被用两次
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArgumentKey {
    Indexed(usize),
    Generic(usize),
}

/// 构造参数集合：按下标的参数和不带下标的泛型参数
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConstructorArgumentValues {
    indexed: BTreeMap<usize, ValueHolder>,
    generic: Vec<ValueHolder>,
}

impl ConstructorArgumentValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_indexed(&mut self, index: usize, holder: ValueHolder) {
        self.indexed.insert(index, holder);
    }

    pub fn add_generic(&mut self, holder: ValueHolder) {
        self.generic.push(holder);
    }

    pub fn indexed(&self) -> &BTreeMap<usize, ValueHolder> {
        &self.indexed
    }

    pub fn generic(&self) -> &[ValueHolder] {
        &self.generic
    }

    pub fn has_indexed(&self, index: usize) -> bool {
        self.indexed.contains_key(&index)
    }

    /// 先下标参数后泛型参数
    pub fn holders_mut(&mut self) -> impl Iterator<Item = &mut ValueHolder> {
        self.indexed.values_mut().chain(self.generic.iter_mut())
    }

    pub fn argument_count(&self) -> usize {
        self.indexed.len() + self.generic.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indexed.is_empty() && self.generic.is_empty()
    }

    /// 合并另一组参数：下标参数覆盖，带名称的泛型参数替换同名参数，其余追加
    pub fn add_all(&mut self, other: &ConstructorArgumentValues) {
        for (index, holder) in &other.indexed {
            self.indexed.insert(*index, holder.clone());
        }
        for holder in &other.generic {
            if let Some(name) = &holder.name {
                self.generic.retain(|existing| existing.name.as_ref() != Some(name));
            }
            self.generic.push(holder.clone());
        }
    }

    pub fn get_indexed(
        &self,
        index: usize,
        required_type: Option<&BeanClass>,
        required_name: Option<&str>,
    ) -> Option<&ValueHolder> {
        let holder = self.indexed.get(&index)?;
        let type_ok = match (&holder.type_name, required_type) {
            (Some(type_name), Some(required)) => required.name() == type_name,
            (Some(_), None) => false,
            (None, _) => true,
        };
        let name_ok = match (&holder.name, required_name) {
            (Some(name), Some(required)) => required.is_empty() || name == required,
            (Some(_), None) => false,
            (None, _) => true,
        };
        (type_ok && name_ok).then_some(holder)
    }

    /// 查找匹配类型和名称、且尚未使用过的泛型参数
    pub fn get_generic(
        &self,
        required_type: Option<&BeanClass>,
        required_name: Option<&str>,
        used: &HashSet<ArgumentKey>,
    ) -> Option<(ArgumentKey, &ValueHolder)> {
        self.generic.iter().enumerate().find_map(|(i, holder)| {
            let key = ArgumentKey::Generic(i);
            if used.contains(&key) {
                return None;
            }
            if let Some(name) = &holder.name {
                match required_name {
                    Some(required) if required.is_empty() || required == name => {}
                    _ => return None,
                }
            }
            if let Some(type_name) = &holder.type_name {
                match required_type {
                    Some(required) if required.name() == type_name => {}
                    _ => return None,
                }
            }
            if let Some(required) = required_type {
                if holder.type_name.is_none() && holder.name.is_none() && !holder.value.is_assignable_to(required) {
                    return None;
                }
            }
            Some((key, holder))
        })
    }

    /// 先按下标再按泛型查找
    pub fn get_argument_value(
        &self,
        index: usize,
        required_type: Option<&BeanClass>,
        required_name: Option<&str>,
        used: &HashSet<ArgumentKey>,
    ) -> Option<(ArgumentKey, &ValueHolder)> {
        if let Some(holder) = self.get_indexed(index, required_type, required_name) {
            return Some((ArgumentKey::Indexed(index), holder));
        }
        self.get_generic(required_type, required_name, used)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PropertyValue {
    pub name: String,
    pub value: BeanValue,
}

/// 有序的属性值集合，同名属性后者覆盖前者
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyValues {
    values: Vec<PropertyValue>,
}

impl PropertyValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, name: impl Into<String>, value: BeanValue) {
        let name = name.into();
        match self.values.iter_mut().find(|pv| pv.name == name) {
            Some(existing) => existing.value = value,
            None => self.values.push(PropertyValue { name, value }),
        }
    }

    pub fn with(mut self, name: impl Into<String>, value: BeanValue) -> Self {
        self.add(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&BeanValue> {
        self.values.iter().find(|pv| pv.name == name).map(|pv| &pv.value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.iter().any(|pv| pv.name == name)
    }

    pub fn remove(&mut self, name: &str) -> Option<BeanValue> {
        let position = self.values.iter().position(|pv| pv.name == name)?;
        Some(self.values.remove(position).value)
    }

    pub fn add_all(&mut self, other: &PropertyValues) {
        for pv in &other.values {
            self.add(pv.name.clone(), pv.value.clone());
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &PropertyValue> {
        self.values.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut PropertyValue> {
        self.values.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::classes;

    #[test]
    fn test_generic_argument_used_once() {
        let mut args = ConstructorArgumentValues::new();
        args.add_generic(ValueHolder::new(BeanValue::object(BeanObject::string("a"))));

        let mut used = HashSet::new();
        let (key, _) = args.get_generic(Some(&classes::string()), None, &used).unwrap();
        used.insert(key);
        assert!(args.get_generic(Some(&classes::string()), None, &used).is_none());
    }

    #[test]
    fn test_typed_generic_argument_requires_matching_type() {
        let mut args = ConstructorArgumentValues::new();
        args.add_generic(ValueHolder::typed(BeanValue::literal("1"), "i32"));

        let used = HashSet::new();
        assert!(args.get_generic(Some(&classes::i64()), None, &used).is_none());
        assert!(args.get_generic(Some(&classes::i32()), None, &used).is_some());
        assert!(args.get_generic(None, None, &used).is_none());
    }

    #[test]
    fn test_indexed_argument_wins_over_generic() {
        let mut args = ConstructorArgumentValues::new();
        args.add_generic(ValueHolder::new(BeanValue::literal("generic")));
        args.add_indexed(0, ValueHolder::new(BeanValue::literal("indexed")));

        let (key, holder) = args.get_argument_value(0, None, None, &HashSet::new()).unwrap();
        assert_eq!(key, ArgumentKey::Indexed(0));
        assert_eq!(holder.value, BeanValue::literal("indexed"));
        assert_eq!(args.argument_count(), 2);
    }

    #[test]
    fn test_property_values_override_in_place() {
        let mut pvs = PropertyValues::new()
            .with("a", BeanValue::literal("1"))
            .with("b", BeanValue::literal("2"));
        pvs.add("a", BeanValue::literal("3"));

        let names: Vec<_> = pvs.iter().map(|pv| pv.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(pvs.get("a"), Some(&BeanValue::literal("3")));
        assert!(pvs.remove("b").is_some());
        assert_eq!(pvs.len(), 1);
    }
}
