//! The `eqgrade init` command.

use anyhow::Result;

pub fn execute() -> Result<()> {
    if std::path::Path::new("eqgrade.toml").exists() {
        println!("eqgrade.toml already exists, skipping.");
    } else {
        std::fs::write("eqgrade.toml", SAMPLE_CONFIG)?;
        println!("Created eqgrade.toml");
    }

    std::fs::create_dir_all("answers")?;
    let example_path = std::path::Path::new("answers/example.json");
    if example_path.exists() {
        println!("answers/example.json already exists, skipping.");
    } else {
        std::fs::write(example_path, EXAMPLE_PAYLOAD)?;
        println!("Created answers/example.json");
    }

    println!("\nNext steps:");
    println!("  1. Edit eqgrade.toml with your API keys and local model directory");
    println!("  2. Run: eqgrade store --payload answers/example.json");
    println!("  3. Run: eqgrade analyze physics-101-q1 student-1 --format table");

    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# eqgrade configuration

temperature = 0.0
max_tokens = 2048
parallelism = 1
storage_dir = "./storage"
output_dir = "./eqgrade-results"

[providers.gemini]
type = "gemini"
api_key = "${GEMINI_API_KEY}"

[providers.openai]
type = "openai"
api_key = "${OPENAI_API_KEY}"

[providers.ollama]
type = "ollama"
base_url = "http://localhost:11434"

# Local sentence encoders; each model directory holds model.onnx and tokenizer.json.
[providers.local]
type = "onnx"
model_dir = "./models"
pooling = "mean"

# E5 reads the first-token representation instead of the token mean.
[providers.local-cls]
type = "onnx"
model_dir = "./models"
pooling = "cls"

# Equation extraction and feedback
[generation]
provider = "gemini"
model = "gemini-1.5-flash"

# Equation matching
[embeddings.equation]
provider = "gemini"
model = "models/embedding-001"

# Descriptive-text similarity
[embeddings.sbert]
provider = "local"
model = "all-MiniLM-L6-v2"

[embeddings.e5]
provider = "local-cls"
model = "intfloat/e5-large-v2"
"#;

const EXAMPLE_PAYLOAD: &str = r#"{
  "questionId": "physics-101-q1",
  "master_answer": "By Newton's second law, F = ma. The kinetic energy of the body is E = 1/2 m v². Work done equals the change in kinetic energy: W = ΔE.",
  "student_answers": [
    {
      "student_id": "student-1",
      "answer_text": "Newton's second law says F = ma, and the kinetic energy is E = 1/2 m v²."
    },
    {
      "student_id": "student-2",
      "answer_text": "Force is mass times acceleration. Energy depends on speed."
    }
  ]
}
"#;
