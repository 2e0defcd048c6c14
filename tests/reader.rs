#[cfg(test)]
mod tests {
    use sluice::{
        Context, FromRow, RowLabeled, RowNames, RowReader, Value, column, compose, string,
    };

    #[derive(Debug, PartialEq)]
    struct Person {
        name: String,
        email: String,
    }

    impl Person {
        fn new(name: String, email: String) -> Self {
            Self { name, email }
        }
    }

    #[derive(Debug, PartialEq)]
    enum Shape {
        Circle { radius: f64 },
        Rectangle { width: f64, height: f64 },
    }

    #[derive(Debug, PartialEq, FromRow)]
    struct Tagged {
        kind: String,
        #[sluice(name = "w")]
        width: Option<f64>,
    }

    fn row(columns: &[(&str, Value)]) -> RowLabeled {
        let labels: RowNames = columns.iter().map(|(n, _)| n.to_string()).collect();
        RowLabeled::new(labels, columns.iter().map(|(_, v)| v.clone()).collect())
    }

    #[test]
    fn compose_person() {
        let reader = compose!(Person::new, string("name"), string("email"));
        let row = row(&[
            ("name", Value::Varchar(Some("M".into()))),
            ("email", Value::Varchar(Some("m@x.com".into()))),
        ]);
        assert_eq!(
            reader.read(&row, &Context::default()).unwrap(),
            Person::new("M".into(), "m@x.com".into())
        );
    }

    #[test]
    fn discriminator() {
        let shape: RowReader<Shape> = string("kind").flat_map(|kind| match kind.as_str() {
            "circle" => column::<f64>("a").map(|radius| Shape::Circle { radius }),
            _ => compose!(
                |width, height| Shape::Rectangle { width, height },
                column::<f64>("a"),
                column::<f64>("b"),
            ),
        });
        let context = Context::default();
        let circle = row(&[
            ("kind", Value::Varchar(Some("circle".into()))),
            ("a", Value::Float64(Some(2.0))),
            ("b", Value::Float64(None)),
        ]);
        let rectangle = row(&[
            ("kind", Value::Varchar(Some("rectangle".into()))),
            ("a", Value::Int32(Some(3))),
            ("b", Value::Float64(Some(4.5))),
        ]);
        assert_eq!(
            shape.read(&circle, &context).unwrap(),
            Shape::Circle { radius: 2.0 }
        );
        assert_eq!(
            shape.read(&rectangle, &context).unwrap(),
            Shape::Rectangle {
                width: 3.0,
                height: 4.5
            }
        );
    }

    #[test]
    fn derived_reader_composes() {
        let reader = Tagged::row_reader().and(column::<i32>("id"));
        let row = row(&[
            ("ID", Value::Int32(Some(9))),
            ("KIND", Value::Varchar(Some("box".into()))),
            ("W", Value::Null),
        ]);
        assert_eq!(
            reader.read(&row, &Context::default()).unwrap(),
            (
                Tagged {
                    kind: "box".into(),
                    width: None
                },
                9
            )
        );
    }
}
