use oaln_core::{generate, Config, PrepareOptions};

fn main() {
    let spec = r#"
openapi: 3.0.3
info: { title: Pets, version: "1" }
paths:
  /pets:
    get:
      tags: [pets]
      parameters:
        - { name: limit, in: query, schema: { type: integer, default: 20 } }
      responses:
        '200':
          description: A page of pets
          content:
            application/json:
              schema: { type: array, items: { $ref: '#/components/schemas/Pet' } }
components:
  schemas:
    Pet:
      type: object
      required: [name]
      properties:
        name: { type: string }
"#;

    let fragment = match oaln_core::document::parse_fragment(spec, "pets.yaml") {
        Ok(fragment) => fragment,
        Err(e) => {
            eprintln!("{:?}", miette::Report::new(e));
            return;
        }
    };

    match generate([fragment], PrepareOptions::default(), &Config::default()) {
        Ok(result) => match result.to_json() {
            Ok(json) => println!("Resolved AST:\n{json}"),
            Err(e) => eprintln!("Failed to serialize: {e}"),
        },
        Err(e) => {
            eprintln!("Failed to generate: {:?}", miette::Report::new(e));
        }
    }
}
