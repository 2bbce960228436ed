use exemplar::parser::{markdown, myst, rest};
use exemplar::{Document, Error, Parser};
use interpreter::{Future, Value};
use pretty_assertions::assert_eq;

fn markdown_parsers() -> Vec<Box<dyn Parser>> {
    vec![
        Box::new(markdown::script_code_block_parser(&[], Default::default()).unwrap()),
        Box::new(markdown::skip_parser().unwrap()),
    ]
}

/// Evaluate every example, collecting the outcome of each.
fn outcomes(document: &Document) -> Vec<Result<(), String>> {
    document.examples().map(|example| example.evaluate().map_err(|error| error.to_string())).collect()
}

fn run_list(document: &Document) -> Value {
    document.namespace().get("run").unwrap()
}

const BLOCKS: &str = "\
```python
run = [1]
```

<!-- skip: next -->

```python
run += [2]
```

```python
run += [3]
```

<!-- skip: start -->

```python
run += [4]
```

```python
run += [5]
```

<!-- skip: end -->

```python
run += [6]
```
";

#[test]
fn next_and_start_end_skip_silently() {
    let document = Document::from_text(BLOCKS, "skip.md", &markdown_parsers()).unwrap();
    assert!(outcomes(&document).iter().all(Result::is_ok));
    assert_eq!(
        run_list(&document),
        Value::List(vec![Value::Integer(1), Value::Integer(3), Value::Integer(6)])
    );
    assert!(document.evaluator().is_none());
}

#[test]
fn conditional_skip_reports_reason() {
    let text = "\
```python
x = 1
```

<!-- skip: next if(x == 1, reason='x is one') -->

```python
assert False
```

<!-- skip: next if(x == 2, reason='x is two') -->

```python
y = 2
```
";
    let document = Document::from_text(text, "skip.md", &markdown_parsers()).unwrap();
    let results: Vec<_> = document.examples().map(|example| example.evaluate()).collect();
    assert_eq!(results.len(), 5);
    assert!(matches!(&results[2], Err(Error::Skip(reason)) if reason == "x is one"));
    assert!(results[4].is_ok());
    assert_eq!(document.namespace().get("y"), Some(Value::Integer(2)));
}

#[test]
fn condition_without_reason_uses_its_text() {
    let text = "\
<!-- skip: start if(True) -->

```python
assert False
```

<!-- skip: end -->
";
    let document = Document::from_text(text, "skip.md", &markdown_parsers()).unwrap();
    let mut examples = document.examples();
    examples.next().unwrap().evaluate().unwrap();
    match examples.next().unwrap().evaluate() {
        Err(Error::Skip(reason)) => assert_eq!(reason, "(True)"),
        other => panic!("unexpected {other:?}"),
    }
    examples.next().unwrap().evaluate().unwrap();
}

#[test]
fn out_of_order_directives() {
    let text = "<!-- skip: end -->\n";
    let document = Document::from_text(text, "skip.md", &markdown_parsers()).unwrap();
    assert_eq!(outcomes(&document), vec![Err("'skip: end' must follow 'skip: start'".to_string())]);

    let text = "<!-- skip: start -->\n\n<!-- skip: next -->\n";
    let document = Document::from_text(text, "skip.md", &markdown_parsers()).unwrap();
    assert_eq!(
        outcomes(&document),
        vec![Ok(()), Err("'skip: next' cannot follow 'skip: start'".to_string())]
    );

    let text = "<!-- skip: lots -->\n";
    let document = Document::from_text(text, "skip.md", &markdown_parsers()).unwrap();
    assert_eq!(outcomes(&document), vec![Err("Bad skip action: lots".to_string())]);
}

#[test]
fn start_end_pairs_can_follow_each_other() {
    let text = "\
```python
run = [1]
```

<!-- skip: start -->

```python
run += [2]
```

<!-- skip: end -->

<!-- skip: start -->

```python
run += [3]
```

<!-- skip: end -->

```python
run += [4]
```
";
    let document = Document::from_text(text, "skip.md", &markdown_parsers()).unwrap();
    let results = outcomes(&document);
    assert_eq!(results.len(), 8);
    assert!(results.iter().all(Result::is_ok));
    assert_eq!(run_list(&document), Value::List(vec![Value::Integer(1), Value::Integer(4)]));
    assert!(document.evaluator().is_none());
}

#[test]
fn start_cannot_follow_start() {
    let text = "<!-- skip: start -->\n\n<!-- skip: start -->\n";
    let document = Document::from_text(text, "skip.md", &markdown_parsers()).unwrap();
    assert_eq!(
        outcomes(&document),
        vec![Ok(()), Err("'skip: start' cannot follow 'skip: start'".to_string())]
    );
}

#[test]
fn end_cannot_have_a_condition() {
    let text = "<!-- skip: start -->\n\n<!-- skip: end if(True) -->\n";
    let document = Document::from_text(text, "skip.md", &markdown_parsers()).unwrap();
    assert_eq!(
        outcomes(&document),
        vec![Ok(()), Err("Cannot have condition on 'skip: end'".to_string())]
    );
    assert!(document.evaluator().is_none());
}

#[test]
fn malformed_arguments() {
    let error = Document::from_text("<!-- skip: -->\n", "skip.md", &markdown_parsers()).unwrap_err();
    assert_eq!(error.to_string(), "malformed arguments to skip: ''");
}

#[test]
fn rest_skip_with_condition() {
    let text = "\
.. code-block:: python

    x = 1

.. skip: next if(x, reason='always')

.. code-block:: python

    assert False
";
    let parsers: Vec<Box<dyn Parser>> = vec![
        Box::new(rest::script_code_block_parser(&[Future::Division]).unwrap()),
        Box::new(rest::skip_parser().unwrap()),
    ];
    let document = Document::from_text(text, "skip.rst", &parsers).unwrap();
    assert_eq!(
        outcomes(&document),
        vec![Ok(()), Ok(()), Err("skipped: always".to_string())]
    );
}

#[test]
fn myst_percent_comment_skip() {
    let text = "\
% skip: next

```python
assert False
```
";
    let parsers: Vec<Box<dyn Parser>> = vec![
        Box::new(myst::script_code_block_parser(&[], Default::default()).unwrap()),
        Box::new(myst::skip_parser().unwrap()),
    ];
    let document = Document::from_text(text, "skip.md", &parsers).unwrap();
    assert_eq!(outcomes(&document), vec![Ok(()), Ok(())]);
}
