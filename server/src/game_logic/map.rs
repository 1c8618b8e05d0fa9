use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Default)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: &Position) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn is_within(&self, other: &Position, radius: f32) -> bool {
        self.distance_to(other) < radius
    }
}

/// Axis-aligned rectangle anchored at its top-left corner.
#[derive(Serialize, Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn closest_point(&self, point: &Position) -> Position {
        Position {
            x: point.x.clamp(self.x, self.x + self.width),
            y: point.y.clamp(self.y, self.y + self.height),
        }
    }

    /// True when a circle of `radius` around `point` overlaps the rectangle.
    pub fn intersects_circle(&self, point: &Position, radius: f32) -> bool {
        self.closest_point(point).distance_to(point) < radius
    }

    pub fn contains(&self, point: &Position) -> bool {
        point.x >= self.x
            && point.x <= self.x + self.width
            && point.y >= self.y
            && point.y <= self.y + self.height
    }
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq)]
pub struct Zone {
    pub name: &'static str,
    #[serde(flatten)]
    pub bounds: Rect,
}

#[derive(Debug, Clone, Copy)]
pub struct CatalogTask {
    pub id: usize,
    pub name: &'static str,
    pub position: Position,
}

#[derive(Debug)]
pub struct GameMap {
    pub width: f32,
    pub height: f32,
    pub walls: &'static [Rect],
    pub zones: &'static [Zone],
    pub tasks: &'static [CatalogTask],
    pub spawn_center: Position,
    pub spawn_radius: f32,
}

impl GameMap {
    pub fn clamp(&self, point: Position, radius: f32) -> Position {
        Position {
            x: point.x.clamp(radius, self.width - radius),
            y: point.y.clamp(radius, self.height - radius),
        }
    }

    pub fn collides(&self, point: &Position, radius: f32) -> bool {
        self.walls
            .iter()
            .any(|wall| wall.intersects_circle(point, radius))
    }

    pub fn zone_at(&self, point: &Position) -> Option<&'static str> {
        self.zones
            .iter()
            .find(|zone| zone.bounds.contains(point))
            .map(|zone| zone.name)
    }

    /// Evenly spaced slots on a circle around the spawn center.
    pub fn spawn_point(&self, slot: usize, total: usize) -> Position {
        let total = total.max(1) as f32;
        let angle = std::f32::consts::TAU * slot as f32 / total;
        Position {
            x: self.spawn_center.x + self.spawn_radius * angle.cos(),
            y: self.spawn_center.y + self.spawn_radius * angle.sin(),
        }
    }
}

const WALL: f32 = 10.0;

// Interior walls split the ship into a 4x2 grid of zones, with 100 unit door gaps.
const SHIP_WALLS: [Rect; 14] = [
    Rect::new(295.0, 0.0, WALL, 150.0),
    Rect::new(295.0, 250.0, WALL, 300.0),
    Rect::new(295.0, 650.0, WALL, 150.0),
    Rect::new(595.0, 0.0, WALL, 150.0),
    Rect::new(595.0, 250.0, WALL, 300.0),
    Rect::new(595.0, 650.0, WALL, 150.0),
    Rect::new(895.0, 0.0, WALL, 150.0),
    Rect::new(895.0, 250.0, WALL, 300.0),
    Rect::new(895.0, 650.0, WALL, 150.0),
    Rect::new(0.0, 395.0, 100.0, WALL),
    Rect::new(200.0, 395.0, 200.0, WALL),
    Rect::new(500.0, 395.0, 200.0, WALL),
    Rect::new(800.0, 395.0, 200.0, WALL),
    Rect::new(1100.0, 395.0, 100.0, WALL),
];

const SHIP_ZONES: [Zone; 8] = [
    Zone {
        name: "Reactor",
        bounds: Rect::new(0.0, 0.0, 300.0, 400.0),
    },
    Zone {
        name: "MedBay",
        bounds: Rect::new(300.0, 0.0, 300.0, 400.0),
    },
    Zone {
        name: "Cafeteria",
        bounds: Rect::new(600.0, 0.0, 300.0, 400.0),
    },
    Zone {
        name: "Weapons",
        bounds: Rect::new(900.0, 0.0, 300.0, 400.0),
    },
    Zone {
        name: "Electrical",
        bounds: Rect::new(0.0, 400.0, 300.0, 400.0),
    },
    Zone {
        name: "Storage",
        bounds: Rect::new(300.0, 400.0, 300.0, 400.0),
    },
    Zone {
        name: "Shields",
        bounds: Rect::new(600.0, 400.0, 300.0, 400.0),
    },
    Zone {
        name: "Navigation",
        bounds: Rect::new(900.0, 400.0, 300.0, 400.0),
    },
];

const SHIP_TASKS: [CatalogTask; 8] = [
    CatalogTask {
        id: 0,
        name: "Start Reactor",
        position: Position::new(100.0, 100.0),
    },
    CatalogTask {
        id: 1,
        name: "Submit Scan",
        position: Position::new(450.0, 100.0),
    },
    CatalogTask {
        id: 2,
        name: "Download Data",
        position: Position::new(820.0, 80.0),
    },
    CatalogTask {
        id: 3,
        name: "Clear Asteroids",
        position: Position::new(1050.0, 100.0),
    },
    CatalogTask {
        id: 4,
        name: "Fix Wiring",
        position: Position::new(150.0, 700.0),
    },
    CatalogTask {
        id: 5,
        name: "Empty Garbage",
        position: Position::new(450.0, 700.0),
    },
    CatalogTask {
        id: 6,
        name: "Prime Shields",
        position: Position::new(750.0, 700.0),
    },
    CatalogTask {
        id: 7,
        name: "Chart Course",
        position: Position::new(1100.0, 700.0),
    },
];

pub static SHIP: GameMap = GameMap {
    width: 1200.0,
    height: 800.0,
    walls: &SHIP_WALLS,
    zones: &SHIP_ZONES,
    tasks: &SHIP_TASKS,
    spawn_center: Position::new(750.0, 200.0),
    spawn_radius: 60.0,
};
