//! Turtle tools
//!
//! Thin wrappers over a shared [`TurtleCanvas`]. No preconditions.

use crate::tool::{number_arg, string_arg, Tool};
use pilotcraft_core::{ToolDefinition, TurtleCanvas};
use pilotcraft_error::{ErrorKind, Result};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::info;

pub type SharedCanvas = Arc<Mutex<TurtleCanvas>>;

fn lock(canvas: &SharedCanvas) -> MutexGuard<'_, TurtleCanvas> {
    canvas.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn number_parameter(name: &str, description: &str) -> Value {
    json!({
        "type": "object",
        "properties": { name: { "type": "number", "description": description } },
        "required": [name]
    })
}

pub struct MoveForward(pub SharedCanvas);

impl Tool for MoveForward {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new("move_forward", "Moves the turtle forward by a given distance in pixels.")
            .with_parameters(number_parameter("distance", "The number of pixels to move forward."))
    }

    fn call(&self, args: &Value) -> Result<String> {
        let distance = number_arg(args, "distance")?;
        lock(&self.0).forward(distance);
        info!(distance, "turtle moved forward");
        Ok(format!("Moved forward by {} pixels.", distance))
    }
}

pub struct Turn(pub SharedCanvas);

impl Tool for Turn {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "turn",
            "Turns the turtle by a given angle in degrees. Positive angles for left turns, negative for right turns.",
        )
        .with_parameters(number_parameter("angle", "The angle in degrees to turn."))
    }

    fn call(&self, args: &Value) -> Result<String> {
        let angle = number_arg(args, "angle")?;
        lock(&self.0).left(angle);
        info!(angle, "turtle turned");
        Ok(format!("Turned by {} degrees.", angle))
    }
}

pub struct DrawCircle(pub SharedCanvas);

impl Tool for DrawCircle {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new("draw_circle", "Draws a circle with a given radius.")
            .with_parameters(number_parameter("radius", "The radius of the circle."))
    }

    fn call(&self, args: &Value) -> Result<String> {
        let radius = number_arg(args, "radius")?;
        lock(&self.0).circle(radius);
        info!(radius, "turtle drew a circle");
        Ok(format!("Drew a circle with a radius of {}.", radius))
    }
}

pub struct ChangePenColor(pub SharedCanvas);

impl Tool for ChangePenColor {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new("change_pen_color", "Changes the pen color for drawing.").with_parameters(json!({
            "type": "object",
            "properties": {
                "color": { "type": "string", "description": "A valid color name (e.g., 'red', 'blue', 'green')." }
            },
            "required": ["color"]
        }))
    }

    fn call(&self, args: &Value) -> Result<String> {
        let color = string_arg(args, "color")?;
        match lock(&self.0).set_pen_color(&color) {
            Ok(_) => {
                info!(%color, "pen color changed");
                Ok(format!("Pen color changed to {}.", color))
            }
            Err(e) if e.kind() == ErrorKind::InvalidColor => Ok(format!("Error: '{}' is not a valid color.", color)),
            Err(e) => Err(e),
        }
    }
}

pub struct PenUp(pub SharedCanvas);

impl Tool for PenUp {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new("pen_up", "Lifts the turtle's pen, so it does not draw when moving.")
    }

    fn call(&self, _args: &Value) -> Result<String> {
        lock(&self.0).pen_up();
        Ok("Pen is now up.".to_string())
    }
}

pub struct PenDown(pub SharedCanvas);

impl Tool for PenDown {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new("pen_down", "Lowers the turtle's pen, so it draws when moving.")
    }

    fn call(&self, _args: &Value) -> Result<String> {
        lock(&self.0).pen_down();
        Ok("Pen is now down.".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pilotcraft_core::Color;

    fn canvas() -> SharedCanvas {
        Arc::new(Mutex::new(TurtleCanvas::default()))
    }

    #[test]
    fn test_tool_messages() {
        let c = canvas();
        assert_eq!(MoveForward(c.clone()).call(&json!({ "distance": 100 })).unwrap(), "Moved forward by 100 pixels.");
        assert_eq!(Turn(c.clone()).call(&json!({ "angle": -90 })).unwrap(), "Turned by -90 degrees.");
        assert_eq!(DrawCircle(c.clone()).call(&json!({ "radius": 50 })).unwrap(), "Drew a circle with a radius of 50.");
        assert_eq!(PenUp(c.clone()).call(&json!({})).unwrap(), "Pen is now up.");
        assert_eq!(PenDown(c.clone()).call(&json!({})).unwrap(), "Pen is now down.");

        let canvas = c.lock().unwrap();
        assert!((canvas.position().x - 100.0).abs() < 1e-6);
        assert!((canvas.heading() - 270.0).abs() < 1e-6);
    }

    #[test]
    fn test_invalid_color_is_reported_not_raised() {
        let c = canvas();
        let tool = ChangePenColor(c.clone());
        assert_eq!(tool.call(&json!({ "color": "red" })).unwrap(), "Pen color changed to red.");
        assert_eq!(
            tool.call(&json!({ "color": "sparkly" })).unwrap(),
            "Error: 'sparkly' is not a valid color."
        );
        assert_eq!(c.lock().unwrap().pen_color(), Color::rgb(255, 0, 0));
    }

    #[test]
    fn test_missing_argument_is_an_error() {
        let err = MoveForward(canvas()).call(&json!({})).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_parameter_schema_order() {
        let def = DrawCircle(canvas()).definition();
        assert_eq!(def.parameter_names(), vec!["radius"]);
        assert!(PenUp(canvas()).definition().parameter_names().is_empty());
    }
}
