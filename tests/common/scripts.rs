/*!
 * Screenplay fixtures
 */

/// Trinity and the Oracle talk about the mission; Neo shows up later
pub const MISSION: &str = "FADE IN:

INT. ORACLE'S KITCHEN - DAY

The Oracle stirs a pot while she hums to herself.

Trinity enters and sets down her bag.

TRINITY
The mission is set for tonight.

ORACLE
Then you know what to bring.

TRINITY
The codes and the map.

ORACLE
Good. The route through the tunnels is safe.

EXT. ROOFTOP - NIGHT

Neo waits at the edge and checks his watch.

NEO
Where is everyone?

TRINITY
On the way.
";

/// Sarah and Maria only talk about John's plan
pub const JOHNS_PLAN: &str = "INT. CAFE - DAY

SARAH
Did you see John's plan?

MARIA
John's plan is brilliant.

SARAH
John thought of everything.
";

/// A scene that turns JOHNS_PLAN into a pass
pub const LAB_SCENE: &str = "

INT. LAB - NIGHT

SARAH
The samples are ready.

MARIA
Run the tests tonight.
";

/// Only one woman speaks
pub const SINGLE_WOMAN: &str = "INT. OFFICE - DAY

SARAH
Where is the file?

JOHN
On your desk.
";
