//! Integration tests for types

#[cfg(test)]
mod tests {
    use shardex_types::*;

    #[test]
    fn test_unit_accessors() {
        let unit = ExecutionUnit::new(
            "ds_2",
            SqlUnit::new(
                "UPDATE t_order SET status = ? WHERE order_id = ?",
                vec![
                    ParameterSet::new(vec!["paid".into(), 7.into()]),
                    ParameterSet::new(vec!["paid".into(), 8.into()]),
                ],
            ),
        );
        assert_eq!(unit.data_source(), "ds_2");
        assert_eq!(unit.parameter_sets().len(), 2);
        assert_eq!(SqlType::classify(unit.sql()), Some(SqlType::Dml));
        assert_eq!(
            unit.to_string(),
            "ds_2 ::: UPDATE t_order SET status = ? WHERE order_id = ?"
        );
    }

    #[test]
    fn test_sql_type_serialization() {
        let json = serde_json::to_string(&SqlType::Dql).unwrap();
        assert_eq!(json, r#""dql""#);

        let deserialized: SqlType = serde_json::from_str(r#""ddl""#).unwrap();
        assert_eq!(deserialized, SqlType::Ddl);
    }

    #[test]
    fn test_null_parameter_from_json() {
        let set: ParameterSet = serde_json::from_str(r#"[null, true, 1.5]"#).unwrap();
        assert_eq!(
            set.values(),
            &[
                ParameterValue::Null,
                ParameterValue::Bool(true),
                ParameterValue::Float(1.5)
            ]
        );
    }
}
