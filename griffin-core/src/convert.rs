//! 类型转换
//!
//! 字符串字面量到数值/布尔的转换，以及数值类型之间的转换。用户可以按
//! (源类型, 目标类型) 注册额外的转换函数。

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::class::BeanClass;
use crate::error::{BeansError, BeansResult};
use crate::object::BeanObject;

pub type ConverterFn = Arc<dyn Fn(&BeanObject) -> anyhow::Result<BeanObject> + Send + Sync>;

#[derive(Default)]
pub struct TypeConverter {
    custom: RwLock<HashMap<(String, String), ConverterFn>>,
}

impl TypeConverter {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册自定义转换
    pub fn register<F>(&self, source: &str, target: &str, converter: F)
    where
        F: Fn(&BeanObject) -> anyhow::Result<BeanObject> + Send + Sync + 'static,
    {
        self.custom
            .write()
            .insert((source.to_string(), target.to_string()), Arc::new(converter));
    }

    /// 可赋值的值原样返回；否则尝试自定义转换和内置转换
    pub fn convert_if_necessary(&self, value: &BeanObject, required: &Arc<BeanClass>) -> BeansResult<BeanObject> {
        if required.is_instance(value) {
            return Ok(value.clone());
        }
        if value.is_null() {
            return Err(self.mismatch(value, required, "null cannot be assigned to a primitive type"));
        }

        let key = (value.class_name().to_string(), required.name().to_string());
        let custom = self.custom.read().get(&key).cloned();
        if let Some(converter) = custom {
            return converter(value).map_err(|e| self.mismatch(value, required, &e.to_string()));
        }

        if let Some(s) = value.as_str() {
            return self.convert_str(s, value, required);
        }
        self.convert_number(value, required)
    }

    /// 转换是否不依赖可变状态，结果可以缓存
    pub fn is_cacheable(&self, value: &BeanObject) -> bool {
        value.as_str().is_some() || value.class().is_primitive()
    }

    fn convert_str(&self, s: &str, value: &BeanObject, required: &Arc<BeanClass>) -> BeansResult<BeanObject> {
        let trimmed = s.trim();
        let converted = match required.name() {
            "i32" => trimmed.parse::<i32>().map(BeanObject::i32).map_err(|e| e.to_string()),
            "i64" => trimmed.parse::<i64>().map(BeanObject::i64).map_err(|e| e.to_string()),
            "f64" => trimmed.parse::<f64>().map(BeanObject::f64).map_err(|e| e.to_string()),
            "bool" => match trimmed.to_ascii_lowercase().as_str() {
                "true" | "yes" | "on" | "1" => Ok(BeanObject::boolean(true)),
                "false" | "no" | "off" | "0" => Ok(BeanObject::boolean(false)),
                other => Err(format!("Invalid boolean value [{}]", other)),
            },
            _ => Err("no matching editors or conversion strategy found".to_string()),
        };
        converted.map_err(|message| self.mismatch(value, required, &message))
    }

    fn convert_number(&self, value: &BeanObject, required: &Arc<BeanClass>) -> BeansResult<BeanObject> {
        let as_i64 = value
            .downcast_ref::<i32>()
            .map(|v| i64::from(*v))
            .or_else(|| value.downcast_ref::<i64>().copied());

        let converted = match (required.name(), as_i64, value.downcast_ref::<f64>()) {
            ("i64", Some(v), _) => Some(BeanObject::i64(v)),
            ("i32", Some(v), _) => i32::try_from(v).ok().map(BeanObject::i32),
            ("f64", Some(v), _) => Some(BeanObject::f64(v as f64)),
            ("String", Some(v), _) => Some(BeanObject::string(v.to_string())),
            ("String", None, Some(v)) => Some(BeanObject::string(v.to_string())),
            ("String", None, None) => value.downcast_ref::<bool>().map(|b| BeanObject::string(b.to_string())),
            _ => None,
        };
        converted.ok_or_else(|| self.mismatch(value, required, "no matching editors or conversion strategy found"))
    }

    fn mismatch(&self, value: &BeanObject, required: &Arc<BeanClass>, message: &str) -> BeansError {
        BeansError::TypeMismatch {
            actual_type: value.class_name().to_string(),
            required_type: required.name().to_string(),
            message: message.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::classes;

    #[test]
    fn test_assignable_value_is_returned_unchanged() {
        let converter = TypeConverter::new();
        let value = BeanObject::string("x");
        let converted = converter.convert_if_necessary(&value, &classes::object()).unwrap();
        assert!(converted.ptr_eq(&value));
    }

    #[test]
    fn test_string_to_numbers_and_bool() {
        let converter = TypeConverter::new();
        let forty_two = converter
            .convert_if_necessary(&BeanObject::string(" 42 "), &classes::i32())
            .unwrap();
        assert_eq!(forty_two.downcast_ref::<i32>(), Some(&42));

        let flag = converter
            .convert_if_necessary(&BeanObject::string("on"), &classes::boolean())
            .unwrap();
        assert_eq!(flag.downcast_ref::<bool>(), Some(&true));

        let err = converter
            .convert_if_necessary(&BeanObject::string("abc"), &classes::i64())
            .unwrap_err();
        assert!(matches!(err, BeansError::TypeMismatch { .. }));
    }

    #[test]
    fn test_numeric_widening_and_narrowing() {
        let converter = TypeConverter::new();
        let wide = converter
            .convert_if_necessary(&BeanObject::i32(7), &classes::i64())
            .unwrap();
        assert_eq!(wide.downcast_ref::<i64>(), Some(&7));

        assert!(converter
            .convert_if_necessary(&BeanObject::i64(i64::MAX), &classes::i32())
            .is_err());
    }

    #[test]
    fn test_custom_converter() {
        let converter = TypeConverter::new();
        converter.register("String", "List", |v| {
            let items = v
                .as_str()
                .unwrap_or_default()
                .split(',')
                .map(|s| BeanObject::string(s.trim()))
                .collect();
            Ok(BeanObject::list(items))
        });

        let list = converter
            .convert_if_necessary(&BeanObject::string("a, b"), &classes::list())
            .unwrap();
        assert_eq!(list.as_list().map(|l| l.len()), Some(2));
    }

    #[test]
    fn test_null_to_primitive_fails() {
        let converter = TypeConverter::new();
        assert!(converter
            .convert_if_necessary(&BeanObject::null(), &classes::i32())
            .is_err());
    }
}
