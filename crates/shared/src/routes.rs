use std::fmt;

/// Views the router knows how to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Login,
    Bills,
    NewBill,
    Dashboard,
}

impl Route {
    pub fn path(self) -> &'static str {
        match self {
            Route::Login => "/",
            Route::Bills => "#employee/bills",
            Route::NewBill => "#employee/bill/new",
            Route::Dashboard => "#admin/dashboard",
        }
    }

    pub fn from_path(path: &str) -> Option<Self> {
        [Route::Login, Route::Bills, Route::NewBill, Route::Dashboard]
            .into_iter()
            .find(|route| route.path() == path)
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}
